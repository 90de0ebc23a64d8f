use indexmap::map::Entry;
use indexmap::IndexMap;
use std::io::Read;
use std::path::Path;
use xml::reader::XmlEvent;

use crate::c::{self, CodeError, CodeMarkup};
use crate::config::Options;
use crate::error::{LoadError, ParseError};
use crate::types::*;

type XmlEvents<R> = xml::reader::Events<R>;
type XmlAttribute = xml::attribute::OwnedAttribute;

/// Function pointer type standing in for "any command". Dropped from the model.
const GENERIC_CALLBACK: &str = "PFN_vkVoidFunction";

//--------------------------------------------------------------------------------------------------
struct ParseCtx<R: Read> {
    events: XmlEvents<R>,
    xpath: String,
    errors: Vec<ParseError>,
    fatal: Option<xml::reader::Error>,
    api: String,
}

impl<R: Read> ParseCtx<R> {
    fn next_event(&mut self) -> Option<XmlEvent> {
        match self.events.next() {
            Some(Ok(e)) => Some(e),
            Some(Err(e)) => {
                if self.fatal.is_none() {
                    self.fatal = Some(e);
                }
                None
            }
            None => None,
        }
    }

    fn push_element(&mut self, name: &str) {
        self.xpath.push('/');
        self.xpath.push_str(name);
    }

    fn pop_element(&mut self) {
        if let Some(separator_pos) = self.xpath.rfind('/') {
            self.xpath.truncate(separator_pos);
        } else {
            self.errors.push(ParseError::Internal {
                desc: "ParseCtx push_element/pop_element mismatch.",
            });
        }
    }

    /// `api="vulkan,vulkansc"` style filter. Elements without the attribute apply to every API.
    fn api_matches(&self, api: Option<&str>) -> bool {
        match api {
            Some(list) => list.split(',').any(|a| a.trim() == self.api),
            None => true,
        }
    }
}

//--------------------------------------------------------------------------------------------------
macro_rules! unwrap_attribute (
    ($ctx:expr, $xpath:expr, $attribute:ident) => {
        let $attribute = match $attribute {
            Some(val) => val,
            None => {
                $ctx.errors.push(ParseError::MissingAttribute {
                    xpath: $xpath.clone(),
                    name: String::from(stringify!($attribute)),
                });
                return None;
            }
        };
    };
);

macro_rules! match_attributes {
    ($a:ident in $attributes:expr, $($p:pat => $e:expr),+) => {
        for $a in $attributes {
            match $a.name.local_name.as_str() {
                $(
                    $p => $e,
                )+
                _ => (),
            }
        }
    };
}

macro_rules! match_elements {
    ($ctx:expr, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::StartElement { name, .. } => {
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                }
                _ => {}
            }
        }
    };

    ($ctx:expr, $attributes:ident, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::StartElement { name, $attributes, .. } => {
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                }
                _ => {}
            }
        }
    };
}

/// Like `match_elements!`, but text between child elements is kept as [`CodeMarkup::Text`].
macro_rules! match_elements_collect_markup {
    ($ctx:expr, $markup:ident, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::Characters(text) | XmlEvent::Whitespace(text) => {
                    $markup.push(CodeMarkup::Text(text))
                }
                XmlEvent::StartElement { name, .. } => {
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                }
                _ => {}
            }
        }
    };

    ($ctx:expr, $attributes:ident, $markup:ident, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::Characters(text) | XmlEvent::Whitespace(text) => {
                    $markup.push(CodeMarkup::Text(text))
                }
                XmlEvent::StartElement { name, $attributes, .. } => {
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                }
                _ => {}
            }
        }
    };
}

//--------------------------------------------------------------------------------------------------
/// Loads the registry from a `vk.xml` file.
pub fn load_file(path: &Path, options: &Options) -> Result<Registry, LoadError> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    let parser = xml::reader::ParserConfig::new().create_reader(file);
    load_xml(parser.into_iter(), options)
}

/// Loads the registry from a stream holding `vk.xml` content.
pub fn load_stream<T: Read>(stream: T, options: &Options) -> Result<Registry, LoadError> {
    let parser = xml::reader::ParserConfig::new().create_reader(stream);
    load_xml(parser.into_iter(), options)
}

fn load_xml<R: Read>(events: XmlEvents<R>, options: &Options) -> Result<Registry, LoadError> {
    let mut ctx = ParseCtx {
        events,
        xpath: String::from(""),
        errors: Vec::new(),
        fatal: None,
        api: options.api.clone(),
    };

    let mut result = None;

    {
        let ctx = &mut ctx;
        match_elements! {ctx,
            "registry" => result = Some(parse_registry(ctx))
        }
    }

    if let Some(e) = ctx.fatal {
        return Err(LoadError::Xml(e));
    }
    if !ctx.errors.is_empty() {
        return Err(LoadError::Parse(ctx.errors));
    }
    let mut registry = result.ok_or(LoadError::MissingRegistryElement)?;
    materialize_command_aliases(&mut registry.commands);

    tracing::debug!(
        types = registry.types.len(),
        enums = registry.enums.len(),
        commands = registry.commands.len(),
        features = registry.features.len(),
        extensions = registry.extensions.len(),
        "registry loaded"
    );
    Ok(registry)
}

fn parse_registry<R: Read>(ctx: &mut ParseCtx<R>) -> Registry {
    let mut registry = Registry::default();

    match_elements! {ctx, attributes,
        "vendorids" => match_elements!{ctx, attributes,
            "vendorid" => if let Some(v) = parse_vendorid(ctx, attributes) {
                registry.vendor_ids.push(v);
            }
        },
        "platforms" => match_elements!{ctx, attributes,
            "platform" => if let Some(v) = parse_platform(ctx, attributes) {
                registry.platforms.push(v);
            }
        },
        "tags" => match_elements!{ctx, attributes,
            "tag" => if let Some(v) = parse_tag(ctx, attributes) {
                registry.tags.push(v);
            }
        },
        "types" => match_elements!{ctx, attributes,
            "type" => if let Some(v) = parse_type(ctx, attributes) {
                if v.name == GENERIC_CALLBACK {
                    registry.elided.insert(v.name);
                } else {
                    insert_unique(ctx, &mut registry.types, v.name.clone(), v);
                }
            }
        },
        "enums" => if let Some(v) = parse_enums(ctx, attributes) {
            insert_unique(ctx, &mut registry.enums, v.name.clone(), v);
        },
        "commands" => match_elements!{ctx, attributes,
            "command" => if let Some(v) = parse_command(ctx, attributes) {
                insert_unique(ctx, &mut registry.commands, String::from(v.name()), v);
            }
        },
        "feature" => if let Some(v) = parse_feature(ctx, attributes) {
            registry.features.push(v);
        },
        "extensions" => match_elements!{ctx, attributes,
            "extension" => if let Some(v) = parse_extension(ctx, attributes) {
                registry.extensions.push(v);
            }
        }
    }

    registry
}

fn insert_unique<R: Read, T>(
    ctx: &mut ParseCtx<R>,
    table: &mut IndexMap<String, T>,
    name: String,
    value: T,
) {
    match table.entry(name) {
        Entry::Occupied(e) => ctx.errors.push(ParseError::DuplicateName {
            xpath: ctx.xpath.clone(),
            name: e.key().clone(),
        }),
        Entry::Vacant(e) => {
            e.insert(value);
        }
    }
}

fn parse_vendorid<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<VendorId> {
    let xpath = ctx.xpath.clone();
    let mut name = None;
    let mut comment = None;
    let mut id = None;

    match_attributes! {a in attributes,
        "name"    => name    = Some(a.value),
        "comment" => comment = Some(a.value),
        "id"      => id      = Some(a.value)
    }

    consume_current_element(ctx);

    unwrap_attribute!(ctx, xpath, name);
    unwrap_attribute!(ctx, xpath, id);
    let id = parse_integer(ctx, &xpath, &id)?;
    if id < 0 || id > i64::from(u32::max_value()) {
        ctx.errors.push(ParseError::ParseInt { xpath, text: id.to_string() });
        return None;
    }

    Some(VendorId {
        name,
        id: id as u32,
        comment,
    })
}

fn parse_platform<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<Platform> {
    let xpath = ctx.xpath.clone();
    let mut name = None;
    let mut comment = None;
    let mut protect = None;

    match_attributes! {a in attributes,
        "name"    => name    = Some(a.value),
        "comment" => comment = Some(a.value),
        "protect" => protect = Some(a.value)
    }

    consume_current_element(ctx);

    unwrap_attribute!(ctx, xpath, name);
    unwrap_attribute!(ctx, xpath, protect);

    Some(Platform {
        name,
        protect,
        comment,
    })
}

fn parse_tag<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<Tag> {
    let xpath = ctx.xpath.clone();
    let mut name = None;
    let mut author = None;
    let mut contact = None;

    match_attributes! {a in attributes,
        "name"    => name    = Some(a.value),
        "author"  => author  = Some(a.value),
        "contact" => contact = Some(a.value)
    }

    consume_current_element(ctx);

    unwrap_attribute!(ctx, xpath, name);
    unwrap_attribute!(ctx, xpath, author);
    unwrap_attribute!(ctx, xpath, contact);

    Some(Tag {
        name,
        author,
        contact,
    })
}

//--------------------------------------------------------------------------------------------------
fn parse_type<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<Type> {
    let xpath = ctx.xpath.clone();
    let mut api = None;
    let mut alias = None;
    let mut requires = None;
    let mut bitvalues = None;
    let mut name = None;
    let mut category = None;
    let mut parent = None;
    let mut returnedonly = None;
    let mut structextends = None;
    let mut comment = None;

    let mut markup = Vec::new();
    let mut members = Vec::new();

    match_attributes! {a in attributes,
        "api"           => api           = Some(a.value),
        "alias"         => alias         = Some(a.value),
        "requires"      => requires      = Some(a.value),
        "bitvalues"     => bitvalues     = Some(a.value),
        "name"          => name          = Some(a.value),
        "category"      => category      = Some(a.value),
        "parent"        => parent        = Some(a.value),
        "returnedonly"  => returnedonly  = Some(a.value),
        "structextends" => structextends = Some(a.value),
        "comment"       => comment       = Some(a.value)
    }

    match_elements_collect_markup! {ctx, attributes, markup,
        "member" => if let Some(v) = parse_declaration(ctx, attributes) {
            members.push(v);
        },
        "type" => markup.push(CodeMarkup::Type(parse_text_element(ctx))),
        "name" => markup.push(CodeMarkup::Name(parse_text_element(ctx))),
        "enum" => markup.push(CodeMarkup::Enum(parse_text_element(ctx)))
    }

    if !ctx.api_matches(api.as_deref()) {
        return None;
    }

    let name = name.or_else(|| first_name(&markup).map(String::from));
    unwrap_attribute!(ctx, xpath, name);

    let kind = if let Some(target) = alias {
        TypeKind::Alias { target }
    } else {
        match category.as_deref() {
            None => {
                if requires.is_none() || requires.as_deref() == Some("vk_platform") {
                    TypeKind::SystemAlias { requires }
                } else {
                    TypeKind::PlatformOpaque { requires }
                }
            }
            Some("include") | Some("define") => TypeKind::Ignored,
            Some("basetype") => match first_type(&markup) {
                Some(underlying) => TypeKind::BaseAlias {
                    underlying: String::from(underlying),
                },
                None => TypeKind::PlatformOpaque { requires },
            },
            Some("bitmask") => match first_type(&markup) {
                Some(underlying) => TypeKind::Bitmask {
                    underlying: String::from(underlying),
                    requires: requires.or(bitvalues),
                },
                None => {
                    ctx.errors.push(ParseError::MissingElement {
                        xpath,
                        name: String::from("type"),
                    });
                    return None;
                }
            },
            Some("handle") => {
                let storage = match first_type(&markup) {
                    Some("VK_DEFINE_HANDLE") => HandleStorage::Dispatchable,
                    Some("VK_DEFINE_NON_DISPATCHABLE_HANDLE") => HandleStorage::NonDispatchable,
                    other => {
                        ctx.errors.push(ParseError::SchemaViolation {
                            xpath,
                            desc: format!("unknown handle definition macro {:?}", other),
                        });
                        return None;
                    }
                };
                TypeKind::Handle { parent, storage }
            }
            Some("enum") => TypeKind::EnumTag,
            Some("funcpointer") => match c::parse_function_pointer(&markup) {
                Ok(decl) => TypeKind::FunctionPointer {
                    ret: decl.ret,
                    params: decl.params,
                },
                Err(e) => {
                    ctx.errors.push(code_error(xpath, e));
                    return None;
                }
            },
            Some("struct") => TypeKind::Struct(Aggregate {
                members,
                returned_only: returnedonly.as_deref() == Some("true"),
                struct_extends: split_list(structextends.as_deref()),
            }),
            Some("union") => TypeKind::Union(Aggregate {
                members,
                returned_only: returnedonly.as_deref() == Some("true"),
                struct_extends: split_list(structextends.as_deref()),
            }),
            Some(other) => {
                ctx.errors.push(ParseError::UnknownCategory {
                    xpath,
                    category: String::from(other),
                });
                return None;
            }
        }
    };

    Some(Type {
        name,
        comment,
        kind,
    })
}

fn first_name(markup: &[CodeMarkup]) -> Option<&str> {
    markup.iter().find_map(|m| match m {
        CodeMarkup::Name(name) => Some(name.as_str()),
        _ => None,
    })
}

fn first_type(markup: &[CodeMarkup]) -> Option<&str> {
    markup.iter().find_map(|m| match m {
        CodeMarkup::Type(name) => Some(name.as_str()),
        _ => None,
    })
}

fn code_error(xpath: String, error: CodeError) -> ParseError {
    match error {
        CodeError::Declarator(desc) => ParseError::Declarator { xpath, desc },
        CodeError::FunctionPointer(desc) => ParseError::FunctionPointer { xpath, desc },
    }
}

/// `<member>`, `<param>` and `<proto>`: a C declaration plus its attribute bag.
fn parse_declaration<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<Field> {
    let xpath = ctx.xpath.clone();
    let mut api = None;
    let mut bag = Attributes::default();
    for a in attributes {
        if a.name.local_name == "api" {
            api = Some(a.value);
        } else {
            bag.insert(a.name.local_name, a.value);
        }
    }

    let mut markup = Vec::new();
    let mut comment = None;
    match_elements_collect_markup! {ctx, markup,
        "type"    => markup.push(CodeMarkup::Type(parse_text_element(ctx))),
        "name"    => markup.push(CodeMarkup::Name(parse_text_element(ctx))),
        "enum"    => markup.push(CodeMarkup::Enum(parse_text_element(ctx))),
        "comment" => comment = Some(parse_text_element(ctx))
    }

    if !ctx.api_matches(api.as_deref()) {
        return None;
    }

    match c::parse_field(&markup) {
        Ok(field) => Some(Field {
            attributes: bag,
            comment,
            ..field
        }),
        Err(e) => {
            ctx.errors.push(code_error(xpath, e));
            None
        }
    }
}

//--------------------------------------------------------------------------------------------------
fn parse_command<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<Command> {
    let xpath = ctx.xpath.clone();
    let mut api = None;
    let mut name = None;
    let mut alias = None;
    let mut queues = None;
    let mut successcodes = None;
    let mut errorcodes = None;
    let mut renderpass = None;
    let mut cmdbufferlevel = None;
    let mut comment = None;

    match_attributes! {a in attributes,
        "api"            => api            = Some(a.value),
        "name"           => name           = Some(a.value),
        "alias"          => alias          = Some(a.value),
        "queues"         => queues         = Some(a.value),
        "successcodes"   => successcodes   = Some(a.value),
        "errorcodes"     => errorcodes     = Some(a.value),
        "renderpass"     => renderpass     = Some(a.value),
        "cmdbufferlevel" => cmdbufferlevel = Some(a.value),
        "comment"        => comment        = Some(a.value)
    }

    if let Some(alias) = alias {
        consume_current_element(ctx);
        if !ctx.api_matches(api.as_deref()) {
            return None;
        }
        unwrap_attribute!(ctx, xpath, name);
        return Some(Command {
            proto: Field {
                name,
                ..Field::default()
            },
            alias_of: Some(alias),
            ..Command::default()
        });
    }

    let mut proto = None;
    let mut params = Vec::new();
    let mut implicit_extern_sync_params = Vec::new();

    match_elements! {ctx, attributes,
        "proto" => proto = Some(parse_declaration(ctx, attributes)),
        "param" => if let Some(v) = parse_declaration(ctx, attributes) {
            params.push(v);
        },
        "implicitexternsyncparams" => match_elements!{ctx,
            "param" => implicit_extern_sync_params.push(parse_text_element(ctx))
        }
    }

    if !ctx.api_matches(api.as_deref()) {
        return None;
    }

    let proto = match proto {
        Some(Some(v)) => v,
        // already reported
        Some(None) => return None,
        None => {
            ctx.errors.push(ParseError::MissingElement {
                xpath,
                name: String::from("proto"),
            });
            return None;
        }
    };

    Some(Command {
        proto,
        params,
        success_codes: split_list(successcodes.as_deref()),
        error_codes: split_list(errorcodes.as_deref()),
        queues: split_list(queues.as_deref()),
        render_pass: renderpass,
        cmd_buffer_level: split_list(cmdbufferlevel.as_deref()),
        implicit_extern_sync_params,
        comment,
        alias_of: None,
    })
}

/// Replaces every `<command name=".." alias=".."/>` placeholder with a copy of the command it
/// aliases, renamed. Placeholders whose target is missing are dropped.
fn materialize_command_aliases(commands: &mut IndexMap<String, Command>) {
    let aliases: Vec<(String, String)> = commands
        .values()
        .filter_map(|c| c.alias_of.clone().map(|target| (String::from(c.name()), target)))
        .collect();

    for (name, target) in aliases {
        match find_command_definition(commands, &target).cloned() {
            Some(mut command) => {
                command.proto.name = name.clone();
                command.alias_of = Some(target);
                commands.insert(name, command);
            }
            None => {
                tracing::warn!(command = %name, alias_of = %target, "alias of unknown command dropped");
                commands.shift_remove(&name);
            }
        }
    }
}

fn find_command_definition<'a>(
    commands: &'a IndexMap<String, Command>,
    name: &str,
) -> Option<&'a Command> {
    let mut current = name;
    // bounded, in case of alias loops
    for _ in 0..=commands.len() {
        let command = commands.get(current)?;
        match command.alias_of {
            Some(ref next) if command.params.is_empty() && command.proto.type_name.is_empty() => {
                current = next
            }
            _ => return Some(command),
        }
    }
    None
}

//--------------------------------------------------------------------------------------------------
fn parse_enums<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<Enums> {
    let xpath = ctx.xpath.clone();
    let mut name = None;
    let mut kind = None;
    let mut bitwidth = None;
    let mut comment = None;
    let mut values = Vec::new();

    match_attributes! {a in attributes,
        "name"     => name     = Some(a.value),
        "type"     => kind     = Some(a.value),
        "bitwidth" => bitwidth = Some(a.value),
        "comment"  => comment  = Some(a.value)
    }

    match_elements! {ctx, attributes,
        "enum" => if let Some(v) = parse_enum(ctx, attributes) {
            values.push(v);
        }
    }

    unwrap_attribute!(ctx, xpath, name);

    let kind = match kind.as_deref() {
        None | Some("constants") => EnumsKind::Constants,
        Some("enum") => EnumsKind::Enum,
        Some("bitmask") => EnumsKind::Bitmask,
        Some(other) => {
            ctx.errors.push(ParseError::SchemaViolation {
                xpath,
                desc: format!("unknown value group type '{}'", other),
            });
            return None;
        }
    };

    let bitwidth = match bitwidth {
        Some(text) => {
            let width = parse_integer(ctx, &xpath, &text)?;
            if width < 0 || width > i64::from(u32::max_value()) {
                ctx.errors.push(ParseError::ParseInt { xpath, text });
                return None;
            }
            Some(width as u32)
        }
        None => None,
    };

    Some(Enums {
        name,
        kind,
        bitwidth,
        comment,
        values,
    })
}

/// Attributes shared by `<enum>` in value groups and in require blocks.
#[derive(Default)]
struct EnumAttributes {
    api: Option<String>,
    name: Option<String>,
    comment: Option<String>,
    extends: Option<String>,
    value: Option<String>,
    bitpos: Option<String>,
    alias: Option<String>,
    offset: Option<String>,
    extnumber: Option<String>,
    dir: Option<String>,
}

impl EnumAttributes {
    fn read(attributes: Vec<XmlAttribute>) -> Self {
        let mut attrs = EnumAttributes::default();
        match_attributes! {a in attributes,
            "api"       => attrs.api       = Some(a.value),
            "name"      => attrs.name      = Some(a.value),
            "comment"   => attrs.comment   = Some(a.value),
            "extends"   => attrs.extends   = Some(a.value),
            "value"     => attrs.value     = Some(a.value),
            "bitpos"    => attrs.bitpos    = Some(a.value),
            "alias"     => attrs.alias     = Some(a.value),
            "offset"    => attrs.offset    = Some(a.value),
            "extnumber" => attrs.extnumber = Some(a.value),
            "dir"       => attrs.dir       = Some(a.value)
        }
        attrs
    }

    /// At most one of `value`, `bitpos`, `alias` and `offset` may be present.
    fn enum_value(&mut self, xpath: &str) -> Result<Option<EnumValue>, ParseError> {
        let count = [&self.value, &self.bitpos, &self.alias, &self.offset]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if count > 1 {
            return Err(ParseError::SchemaViolation {
                xpath: String::from(xpath),
                desc: format!(
                    "ambiguous enum value: value={:?}, bitpos={:?}, alias={:?}, offset={:?}",
                    self.value, self.bitpos, self.alias, self.offset
                ),
            });
        }

        if let Some(offset) = self.offset.take() {
            let offset = integer(xpath, &offset)?;
            let extnumber = match self.extnumber.take() {
                Some(text) => Some(integer(xpath, &text)?),
                None => None,
            };
            let negative = match self.dir.as_deref() {
                Some("-") => true,
                None => false,
                Some(other) => {
                    return Err(ParseError::SchemaViolation {
                        xpath: String::from(xpath),
                        desc: format!("unexpected dir '{}'", other),
                    })
                }
            };
            Ok(Some(EnumValue::Offset {
                offset,
                extnumber,
                negative,
            }))
        } else if let Some(bitpos) = self.bitpos.take() {
            let bitpos = integer(xpath, &bitpos)?;
            if bitpos < 0 || bitpos > 63 {
                return Err(ParseError::SchemaViolation {
                    xpath: String::from(xpath),
                    desc: format!("bit position {} out of range", bitpos),
                });
            }
            Ok(Some(EnumValue::Bitpos(bitpos as u32)))
        } else if let Some(value) = self.value.take() {
            Ok(Some(EnumValue::Value(value)))
        } else if let Some(alias) = self.alias.take() {
            Ok(Some(EnumValue::Alias(alias)))
        } else {
            Ok(None)
        }
    }
}

fn parse_enum<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<Enum> {
    let xpath = ctx.xpath.clone();
    let mut attrs = EnumAttributes::read(attributes);
    consume_current_element(ctx);

    if !ctx.api_matches(attrs.api.as_deref()) {
        return None;
    }
    let name = attrs.name.take();
    unwrap_attribute!(ctx, xpath, name);

    let value = match attrs.enum_value(&xpath) {
        Ok(Some(v)) => v,
        Ok(None) => {
            ctx.errors.push(ParseError::SchemaViolation {
                xpath,
                desc: format!("enum '{}' has no value, bitpos or alias", name),
            });
            return None;
        }
        Err(e) => {
            ctx.errors.push(e);
            return None;
        }
    };

    Some(Enum {
        name,
        value,
        comment: attrs.comment,
    })
}

fn parse_enum_ref<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<EnumRef> {
    let xpath = ctx.xpath.clone();
    let mut attrs = EnumAttributes::read(attributes);
    consume_current_element(ctx);

    if !ctx.api_matches(attrs.api.as_deref()) {
        return None;
    }
    let name = attrs.name.take();
    unwrap_attribute!(ctx, xpath, name);

    let value = match attrs.enum_value(&xpath) {
        Ok(v) => v,
        Err(e) => {
            ctx.errors.push(e);
            return None;
        }
    };

    Some(EnumRef {
        name,
        extends: attrs.extends,
        value,
        comment: attrs.comment,
    })
}

//--------------------------------------------------------------------------------------------------
fn parse_feature<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<Feature> {
    let xpath = ctx.xpath.clone();
    let mut api = None;
    let mut name = None;
    let mut number = None;
    let mut comment = None;
    let mut requires = Vec::new();

    match_attributes! {a in attributes,
        "api"     => api     = Some(a.value),
        "name"    => name    = Some(a.value),
        "number"  => number  = Some(a.value),
        "comment" => comment = Some(a.value)
    }

    match_elements! {ctx, attributes,
        "require" => if let Some(v) = parse_require(ctx, attributes) {
            requires.push(v);
        }
    }

    unwrap_attribute!(ctx, xpath, api);
    unwrap_attribute!(ctx, xpath, name);
    unwrap_attribute!(ctx, xpath, number);

    if !ctx.api_matches(Some(api.as_str())) {
        return None;
    }

    Some(Feature {
        api: split_list(Some(api.as_str())),
        name,
        number,
        comment,
        requires,
    })
}

fn parse_extension<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<Extension> {
    let xpath = ctx.xpath.clone();
    let mut name = None;
    let mut number = None;
    let mut ext_type = None;
    let mut supported = None;
    let mut requires = None;
    let mut depends = None;
    let mut platform = None;
    let mut protect = None;
    let mut promotedto = None;
    let mut comment = None;
    let mut require = Require::default();

    match_attributes! {a in attributes,
        "name"       => name       = Some(a.value),
        "number"     => number     = Some(a.value),
        "type"       => ext_type   = Some(a.value),
        "supported"  => supported  = Some(a.value),
        "requires"   => requires   = Some(a.value),
        "depends"    => depends    = Some(a.value),
        "platform"   => platform   = Some(a.value),
        "protect"    => protect    = Some(a.value),
        "promotedto" => promotedto = Some(a.value),
        "comment"    => comment    = Some(a.value)
    }

    match_elements! {ctx, attributes,
        "require" => if let Some(v) = parse_require(ctx, attributes) {
            require.append(v);
        }
    }

    unwrap_attribute!(ctx, xpath, name);
    unwrap_attribute!(ctx, xpath, supported);

    let number = match number {
        Some(text) => Some(parse_integer(ctx, &xpath, &text)?),
        None => None,
    };

    Some(Extension {
        name,
        number,
        ext_type,
        supported: SupportStatus::parse(&supported),
        requires: requires.or(depends).map(|v| split_names(&v)).unwrap_or_default(),
        platform,
        protect,
        promoted_to: promotedto,
        comment,
        require,
    })
}

/// `<require>` of a feature or extension. Children are collected in document order and then
/// flattened by [`Require::from_items`].
fn parse_require<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<Require> {
    let mut api = None;
    let mut comment = None;
    let mut items = Vec::new();

    match_attributes! {a in attributes,
        "api"     => api     = Some(a.value),
        "comment" => comment = Some(a.value)
    }

    match_elements! {ctx, attributes,
        "comment" => items.push(InterfaceItem::Comment(parse_text_element(ctx))),
        "type" => if let Some(v) = parse_reference(ctx, attributes) {
            items.push(InterfaceItem::Type(v));
        },
        "enum" => if let Some(v) = parse_enum_ref(ctx, attributes) {
            items.push(InterfaceItem::Enum(v));
        },
        "command" => if let Some(v) = parse_reference(ctx, attributes) {
            items.push(InterfaceItem::Command(v));
        }
    }

    if !ctx.api_matches(api.as_deref()) {
        return None;
    }

    Some(Require::from_items(comment, items))
}

fn parse_reference<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<String> {
    let xpath = ctx.xpath.clone();
    let mut api = None;
    let mut name = None;
    match_attributes! {a in attributes,
        "api"  => api  = Some(a.value),
        "name" => name = Some(a.value)
    }
    consume_current_element(ctx);

    if !ctx.api_matches(api.as_deref()) {
        return None;
    }
    unwrap_attribute!(ctx, xpath, name);
    Some(name)
}

//--------------------------------------------------------------------------------------------------
fn split_list(text: Option<&str>) -> Vec<String> {
    match text {
        Some(text) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => Vec::new(),
    }
}

/// Dependency names from `requires="A,B"` or `depends="A+(B,C)"`.
fn split_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in text
        .split(|c| c == ',' || c == '+' || c == '(' || c == ')')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if !names.iter().any(|n| n == name) {
            names.push(String::from(name));
        }
    }
    names
}

fn integer(xpath: &str, text: &str) -> Result<i64, ParseError> {
    let parse_res = if text.starts_with("0x") {
        i64::from_str_radix(text.split_at(2).1, 16)
    } else {
        i64::from_str_radix(text, 10)
    };

    parse_res.map_err(|_| ParseError::ParseInt {
        xpath: String::from(xpath),
        text: String::from(text),
    })
}

fn parse_integer<R: Read>(ctx: &mut ParseCtx<R>, xpath: &str, text: &str) -> Option<i64> {
    match integer(xpath, text) {
        Ok(v) => Some(v),
        Err(e) => {
            ctx.errors.push(e);
            None
        }
    }
}

fn consume_current_element<R: Read>(ctx: &mut ParseCtx<R>) {
    let mut depth = 1;
    while let Some(e) = ctx.next_event() {
        match e {
            XmlEvent::StartElement { name, .. } => {
                ctx.push_element(name.local_name.as_str());
                depth += 1;
            }
            XmlEvent::EndElement { .. } => {
                depth -= 1;
                ctx.pop_element();
                if depth == 0 {
                    break;
                }
            }
            _ => (),
        }
    }
}

fn parse_text_element<R: Read>(ctx: &mut ParseCtx<R>) -> String {
    let mut result = String::new();
    let mut depth = 1;
    while let Some(e) = ctx.next_event() {
        match e {
            XmlEvent::StartElement { name, .. } => {
                ctx.push_element(name.local_name.as_str());
                depth += 1;
            }
            XmlEvent::Characters(text) => result.push_str(&text),
            XmlEvent::EndElement { .. } => {
                depth -= 1;
                ctx.pop_element();
                if depth == 0 {
                    break;
                }
            }
            _ => (),
        }
    }
    result
}

//--------------------------------------------------------------------------------------------------
#[cfg(test)]
mod test {
    use super::*;

    fn load(xml: &str) -> Result<Registry, LoadError> {
        load_stream(xml.as_bytes(), &Options::default())
    }

    #[test]
    fn integers() {
        assert_eq!(integer("/x", "0x10000"), Ok(0x10000));
        assert_eq!(integer("/x", "1000"), Ok(1000));
        assert_eq!(
            integer("/x", "12a"),
            Err(ParseError::ParseInt {
                xpath: String::from("/x"),
                text: String::from("12a"),
            })
        );
    }

    #[test]
    fn dependency_names() {
        assert_eq!(split_names("VK_KHR_surface"), vec!["VK_KHR_surface"]);
        assert_eq!(
            split_names("VK_KHR_a+VK_KHR_b,VK_VERSION_1_1+(VK_KHR_a)"),
            vec!["VK_KHR_a", "VK_KHR_b", "VK_VERSION_1_1"]
        );
    }

    #[test]
    fn missing_registry_element() {
        match load("<other></other>") {
            Err(LoadError::MissingRegistryElement) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn malformed_xml() {
        match load("<registry><types></registry>") {
            Err(LoadError::Xml(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn unknown_category_is_fatal() {
        let xml = r#"<registry><types><type category="bogus" name="X"/></types></registry>"#;
        match load(xml) {
            Err(LoadError::Parse(errors)) => assert_eq!(
                errors,
                vec![ParseError::UnknownCategory {
                    xpath: String::from("/registry/types/type"),
                    category: String::from("bogus"),
                }]
            ),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn missing_name_is_fatal() {
        let xml = r#"<registry><tags><tag author="Khronos" contact="someone"/></tags></registry>"#;
        match load(xml) {
            Err(LoadError::Parse(errors)) => assert_eq!(
                errors,
                vec![ParseError::MissingAttribute {
                    xpath: String::from("/registry/tags/tag"),
                    name: String::from("name"),
                }]
            ),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn duplicate_type_is_fatal() {
        let xml = r#"<registry><types>
            <type category="enum" name="VkA"/>
            <type category="enum" name="VkA"/>
        </types></registry>"#;
        match load(xml) {
            Err(LoadError::Parse(errors)) => match errors.as_slice() {
                [ParseError::DuplicateName { name, .. }] => assert_eq!(name, "VkA"),
                other => panic!("unexpected errors {:?}", other),
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn bad_pointer_syntax_is_fatal() {
        let xml = r#"<registry><types>
            <type category="struct" name="VkA"><member><type>void</type>* const <name>p</name></member></type>
        </types></registry>"#;
        match load(xml) {
            Err(LoadError::Parse(errors)) => match errors.as_slice() {
                [ParseError::Declarator { xpath, .. }] => {
                    assert_eq!(xpath, "/registry/types/type/member")
                }
                other => panic!("unexpected errors {:?}", other),
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn bitwidth_out_of_range_is_fatal() {
        for width in &["-1", "4294967296"] {
            let xml = format!(
                r#"<registry><enums name="VkA" type="bitmask" bitwidth="{}"/></registry>"#,
                width
            );
            match load(&xml) {
                Err(LoadError::Parse(errors)) => assert_eq!(
                    errors,
                    vec![ParseError::ParseInt {
                        xpath: String::from("/registry/enums"),
                        text: String::from(*width),
                    }]
                ),
                other => panic!("unexpected result {:?}", other),
            }
        }

        let registry =
            load(r#"<registry><enums name="VkA" type="bitmask" bitwidth="64"/></registry>"#).unwrap();
        assert_eq!(registry.enums["VkA"].bitwidth, Some(64));
    }

    #[test]
    fn unknown_elements_and_attributes_are_skipped() {
        let xml = r#"<registry>
            <comment>Copyright</comment>
            <spirvextensions><spirvextension name="x"><enable extension="y"/></spirvextension></spirvextensions>
            <types>
                <type category="enum" name="VkA" deprecated="true"/>
            </types>
        </registry>"#;
        let registry = load(xml).unwrap();
        assert_eq!(registry.types["VkA"].kind, TypeKind::EnumTag);
    }

    #[test]
    fn aliases_follow_chains() {
        let xml = r#"<registry><commands>
            <command><proto><type>void</type> <name>vkA</name></proto></command>
            <command name="vkB" alias="vkA"/>
            <command name="vkC" alias="vkB"/>
            <command name="vkD" alias="vkMissing"/>
        </commands></registry>"#;
        let registry = load(xml).unwrap();
        let names: Vec<&str> = registry.commands.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["vkA", "vkB", "vkC"]);
        assert_eq!(registry.commands["vkC"].name(), "vkC");
        assert_eq!(registry.commands["vkC"].return_type(), "void");
        assert_eq!(registry.commands["vkC"].alias_of.as_deref(), Some("vkB"));
    }
}
