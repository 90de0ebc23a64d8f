//! Rendering of resolved units into definition bundles and type tables.
//!
//! Everything produced here is plain data deriving `Serialize`; the writer decides the
//! syntax. Every category keeps the order of the closure or require blocks it comes from.

use indexmap::IndexSet;

use crate::config::Options;
use crate::diag::Diagnostics;
use crate::docs::DocSource;
use crate::error::ResolveError;
use crate::resolve::{Closure, Plan, ResolveMode, Unit, UnitKind};
use crate::subst;
use crate::types::*;

//--------------------------------------------------------------------------------------------------
/// A value as the binding generator spells it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Literal {
    Int(String),
    /// 64-bit integer, suffixes stripped.
    Wide(String),
    Float(String),
    /// Single bit, `0x` followed by at least eight hex digits.
    Mask(String),
    Text(String),
    /// Name of another value.
    Alias(String),
}

impl Literal {
    /// Classifies an enum value.
    ///
    /// `extnumber` is the number of the extension introducing the value and is used for offset
    /// values without their own `extnumber`. Returns `None` if an offset has neither, or if the
    /// value does not fit in 64 bits.
    pub fn classify(value: &EnumValue, extnumber: Option<i64>) -> Option<Literal> {
        match *value {
            EnumValue::Value(ref text) => Some(Literal::from_text(text)),
            EnumValue::Bitpos(bit) => {
                let mask = 1u64.checked_shl(bit)?;
                Some(Literal::Mask(format!("0x{:08X}", mask)))
            }
            EnumValue::Alias(ref name) => Some(Literal::Alias(name.clone())),
            EnumValue::Offset {
                offset,
                extnumber: own,
                negative,
            } => {
                let extnumber = own.or(extnumber)?;
                let value = EnumValue::offset_value(offset, extnumber, negative)?;
                Some(Literal::Int(value.to_string()))
            }
        }
    }

    /// Textual classification of a `value` attribute. The number itself is never reinterpreted.
    pub fn from_text(text: &str) -> Literal {
        let text = text.trim();
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return Literal::Text(String::from(&text[1..text.len() - 1]));
        }
        if let Some(number) = strip_float_suffix(text) {
            return Literal::Float(String::from(number));
        }
        let (stripped, wide) = strip_integer_suffixes(text);
        if wide {
            Literal::Wide(stripped)
        } else {
            Literal::Int(stripped)
        }
    }
}

/// Removes `U`/`L` suffixes from the numeric tokens of `text`. Identifiers are left alone.
///
/// The flag is set when any suffix marks a 64-bit (`LL`) value.
fn strip_integer_suffixes(text: &str) -> (String, bool) {
    let mut result = String::with_capacity(text.len());
    let mut wide = false;
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if !is_identifier_char(c) {
            result.push(c);
            rest = &rest[c.len_utf8()..];
            continue;
        }
        let end = rest
            .find(|c: char| !is_identifier_char(c))
            .unwrap_or(rest.len());
        let token = &rest[..end];
        rest = &rest[end..];

        if token.starts_with(|c: char| c.is_ascii_digit()) {
            let number = token.trim_end_matches(|c| c == 'U' || c == 'u' || c == 'L' || c == 'l');
            let suffix = &token[number.len()..];
            if suffix.to_ascii_uppercase().contains("LL") {
                wide = true;
            }
            result.push_str(number);
        } else {
            result.push_str(token);
        }
    }
    (result, wide)
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn strip_float_suffix(text: &str) -> Option<&str> {
    let number = text.strip_suffix('F').or_else(|| text.strip_suffix('f'))?;
    if number.contains('.') && number.parse::<f64>().is_ok() {
        Some(number)
    } else {
        None
    }
}

//--------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub indirection: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub array: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitfield: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub len: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extern_sync: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub no_auto_validity: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub valid_extension_structs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDef {
    pub name: String,
    pub return_type: FieldDef,
    pub params: Vec<FieldDef>,
    /// No parameter passed by value is a dispatchable handle.
    pub global: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub success_codes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub queues: Vec<String>,
    /// `inside`, `outside` or `both`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_pass: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cmd_buffer_level: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub implicit_extern_sync_params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueDef {
    pub name: String,
    pub value: Literal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// An enumeration or flag-bits group with its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueGroupDef {
    /// Type the group is emitted for.
    pub name: String,
    /// Name of the value group in the registry, when it differs from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub values: Vec<ValueDef>,
}

/// A value added to an existing enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumExtensionDef {
    pub extends: String,
    pub name: String,
    pub value: Literal,
}

/// Constants, enumerations and commands of one feature or extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionBundle {
    pub name: String,
    pub extension: bool,
    pub constants: Vec<ValueDef>,
    pub enums: Vec<ValueGroupDef>,
    pub bitmasks: Vec<ValueGroupDef>,
    pub enum_extensions: Vec<EnumExtensionDef>,
    pub commands: Vec<CommandDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub dispatchable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedefDef {
    pub name: String,
    pub underlying: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformTypeDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitmaskDef {
    pub name: String,
    pub underlying: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_bits: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionPointerDef {
    pub name: String,
    pub return_type: FieldDef,
    pub params: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructDef {
    pub name: String,
    pub union: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub returned_only: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    pub members: Vec<FieldDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Type definitions needed by a set of units, grouped by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeTable {
    pub name: String,
    pub handles: Vec<HandleDef>,
    pub base_types: Vec<TypedefDef>,
    pub platform_types: Vec<PlatformTypeDef>,
    pub enum_tags: Vec<String>,
    pub bitmasks: Vec<BitmaskDef>,
    pub function_pointers: Vec<FunctionPointerDef>,
    pub structs: Vec<StructDef>,
    pub aliases: Vec<TypedefDef>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

//--------------------------------------------------------------------------------------------------
pub struct Emitter<'r> {
    registry: &'r Registry,
    docs: &'r dyn DocSource,
}

impl<'r> Emitter<'r> {
    pub fn new(registry: &'r Registry, docs: &'r dyn DocSource) -> Self {
        Emitter { registry, docs }
    }

    pub fn bundle(&self, unit: &Unit, diagnostics: &mut Diagnostics) -> DefinitionBundle {
        let mut bundle = DefinitionBundle {
            name: String::from(unit.name),
            extension: unit.kind == UnitKind::Extension,
            constants: Vec::new(),
            enums: Vec::new(),
            bitmasks: Vec::new(),
            enum_extensions: Vec::new(),
            commands: Vec::new(),
        };

        let mut seen_values = IndexSet::new();
        let mut seen_commands = IndexSet::new();
        for require in &unit.requires {
            for e in &require.enums {
                if !seen_values.insert(e.name.as_str()) {
                    continue;
                }
                self.emit_enum_ref(e, unit, &mut bundle, diagnostics);
            }
            for name in &require.commands {
                if !seen_commands.insert(name.as_str()) {
                    continue;
                }
                // undefined commands were already reported by the resolver
                if let Some(command) = self.registry.command(name) {
                    bundle.commands.push(self.command(command, diagnostics));
                }
            }
        }

        // a flag-bits group is reachable from its enum tag and from its bitmask type
        let mut seen_groups = IndexSet::new();
        for name in unit.closure.iter() {
            let ty = match self.registry.type_named(name) {
                Some(ty) => ty,
                None => continue,
            };
            match ty.kind {
                TypeKind::EnumTag => {
                    let group = match self.registry.value_group(name) {
                        Some(group) => group,
                        None => continue,
                    };
                    if !seen_groups.insert(group.name.as_str()) {
                        continue;
                    }
                    let def = self.value_group(name, group, unit.number);
                    match group.kind {
                        EnumsKind::Bitmask => bundle.bitmasks.push(def),
                        EnumsKind::Enum | EnumsKind::Constants => bundle.enums.push(def),
                    }
                }
                TypeKind::Bitmask { ref requires, .. } => {
                    let group = self.registry.value_group(name).or_else(|| {
                        requires
                            .as_ref()
                            .and_then(|r| self.registry.value_group(r))
                    });
                    if let Some(group) = group {
                        if seen_groups.insert(group.name.as_str()) {
                            bundle.bitmasks.push(self.value_group(name, group, unit.number));
                        }
                    }
                }
                TypeKind::Ignored
                | TypeKind::SystemAlias { .. }
                | TypeKind::BaseAlias { .. }
                | TypeKind::PlatformOpaque { .. }
                | TypeKind::Handle { .. }
                | TypeKind::FunctionPointer { .. }
                | TypeKind::Struct(_)
                | TypeKind::Union(_)
                | TypeKind::Alias { .. } => (),
            }
        }

        bundle
    }

    fn emit_enum_ref(
        &self,
        e: &EnumRef,
        unit: &Unit,
        bundle: &mut DefinitionBundle,
        diagnostics: &mut Diagnostics,
    ) {
        let value = match (&e.value, self.registry.constant(&e.name)) {
            (Some(value), _) => Literal::classify(value, unit.number),
            (None, Some(constant)) => Literal::classify(&constant.value, unit.number),
            (None, None) => {
                // reference to a value of an enumeration, emitted with its group
                if e.extends.is_none() && !self.is_group_value(&e.name) {
                    tracing::warn!(name = %e.name, unit = %unit.name, "undefined value");
                    diagnostics.unresolved(&e.name, unit.name);
                }
                return;
            }
        };
        let value = match value {
            Some(v) => v,
            None => {
                tracing::warn!(name = %e.name, unit = %unit.name, "value without extension number or out of range");
                return;
            }
        };

        match e.extends {
            Some(ref extends) => bundle.enum_extensions.push(EnumExtensionDef {
                extends: extends.clone(),
                name: e.name.clone(),
                value,
            }),
            None => bundle.constants.push(ValueDef {
                name: e.name.clone(),
                value,
                comment: e.comment.clone(),
            }),
        }
    }

    fn is_group_value(&self, name: &str) -> bool {
        self.registry
            .enums
            .values()
            .any(|group| group.values.iter().any(|v| v.name == name))
    }

    fn value_group(&self, name: &str, group: &Enums, extnumber: Option<i64>) -> ValueGroupDef {
        let values = group
            .values
            .iter()
            .filter_map(|v| {
                Literal::classify(&v.value, extnumber).map(|value| ValueDef {
                    name: v.name.clone(),
                    value,
                    comment: v.comment.clone(),
                })
            })
            .collect();
        ValueGroupDef {
            name: String::from(name),
            group: if group.name == name {
                None
            } else {
                Some(group.name.clone())
            },
            values,
        }
    }

    fn field(&self, field: &Field, diagnostics: &mut Diagnostics) -> FieldDef {
        FieldDef {
            name: field.name.clone(),
            type_name: subst::substitute(&field.type_name, diagnostics),
            modifier: field.modifier.map(|m| String::from(m.as_str())),
            indirection: field.indirection.suffix(),
            array: field
                .array_shape
                .iter()
                .flatten()
                .map(ToString::to_string)
                .collect(),
            bitfield: field.bitfield_size,
            len: field.attributes.lengths().into_iter().map(String::from).collect(),
            optional: field.attributes.is_optional(),
            extern_sync: field.attributes.extern_sync().map(String::from),
            no_auto_validity: field.attributes.no_auto_validity(),
            valid_extension_structs: field
                .attributes
                .valid_extension_structs()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// True when no parameter passed by value is a dispatchable handle.
    pub fn is_global(&self, command: &Command) -> bool {
        !command
            .params
            .iter()
            .any(|p| !p.is_pointer() && self.registry.is_dispatchable_handle(&p.type_name))
    }

    fn command(&self, command: &Command, diagnostics: &mut Diagnostics) -> CommandDef {
        CommandDef {
            name: String::from(command.name()),
            return_type: self.field(&command.proto, diagnostics),
            params: command
                .params
                .iter()
                .map(|p| self.field(p, diagnostics))
                .collect(),
            global: self.is_global(command),
            success_codes: command.success_codes.clone(),
            error_codes: command.error_codes.clone(),
            queues: command.queues.clone(),
            render_pass: command.render_pass.clone(),
            cmd_buffer_level: command.cmd_buffer_level.clone(),
            implicit_extern_sync_params: command.implicit_extern_sync_params.clone(),
            alias_of: command.alias_of.clone(),
            doc: self.docs.command_doc(command.name()),
        }
    }

    pub fn type_table(
        &self,
        name: &str,
        closure: &Closure,
        diagnostics: &mut Diagnostics,
    ) -> TypeTable {
        let mut table = TypeTable {
            name: String::from(name),
            handles: Vec::new(),
            base_types: Vec::new(),
            platform_types: Vec::new(),
            enum_tags: Vec::new(),
            bitmasks: Vec::new(),
            function_pointers: Vec::new(),
            structs: Vec::new(),
            aliases: Vec::new(),
        };

        for type_name in closure.iter() {
            let ty = match self.registry.type_named(type_name) {
                Some(ty) => ty,
                None => continue,
            };
            match ty.kind {
                TypeKind::Ignored | TypeKind::SystemAlias { .. } => (),
                TypeKind::BaseAlias { ref underlying } => table.base_types.push(TypedefDef {
                    name: ty.name.clone(),
                    underlying: subst::substitute(underlying, diagnostics),
                }),
                TypeKind::PlatformOpaque { ref requires } => {
                    table.platform_types.push(PlatformTypeDef {
                        name: ty.name.clone(),
                        requires: requires.clone(),
                    })
                }
                TypeKind::Bitmask {
                    ref underlying,
                    ref requires,
                } => table.bitmasks.push(BitmaskDef {
                    name: ty.name.clone(),
                    underlying: underlying.clone(),
                    flag_bits: requires.clone(),
                }),
                TypeKind::Handle {
                    ref parent,
                    storage,
                } => table.handles.push(HandleDef {
                    name: ty.name.clone(),
                    parent: parent.clone(),
                    dispatchable: storage == HandleStorage::Dispatchable,
                }),
                TypeKind::EnumTag => table.enum_tags.push(ty.name.clone()),
                TypeKind::FunctionPointer {
                    ref ret,
                    ref params,
                } => table.function_pointers.push(FunctionPointerDef {
                    name: ty.name.clone(),
                    return_type: self.field(ret, diagnostics),
                    params: params.iter().map(|p| self.field(p, diagnostics)).collect(),
                }),
                TypeKind::Struct(ref aggregate) => {
                    table.structs.push(self.aggregate(ty, aggregate, false, diagnostics))
                }
                TypeKind::Union(ref aggregate) => {
                    table.structs.push(self.aggregate(ty, aggregate, true, diagnostics))
                }
                TypeKind::Alias { ref target } => table.aliases.push(TypedefDef {
                    name: ty.name.clone(),
                    underlying: target.clone(),
                }),
            }
        }

        table
    }

    fn aggregate(
        &self,
        ty: &Type,
        aggregate: &Aggregate,
        union: bool,
        diagnostics: &mut Diagnostics,
    ) -> StructDef {
        StructDef {
            name: ty.name.clone(),
            union,
            returned_only: aggregate.returned_only,
            extends: aggregate.struct_extends.clone(),
            members: aggregate
                .members
                .iter()
                .map(|m| self.field(m, diagnostics))
                .collect(),
            doc: self.docs.struct_doc(&ty.name),
        }
    }
}

//--------------------------------------------------------------------------------------------------
/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct Output {
    pub bundles: Vec<DefinitionBundle>,
    pub core_types: TypeTable,
    pub extension_types: TypeTable,
    pub diagnostics: Diagnostics,
}

pub const CORE_TYPES: &str = "core_types";
pub const EXTENSION_TYPES: &str = "extension_types";

/// Resolves every unit of `registry` and renders the bundles and type tables.
pub fn generate(
    registry: &Registry,
    options: &Options,
    docs: &dyn DocSource,
) -> Result<Output, ResolveError> {
    let plan = Plan::new(registry, options)?;
    let emitter = Emitter::new(registry, docs);
    let mut diagnostics = plan.diagnostics();

    let bundles = plan
        .units()
        .map(|unit| emitter.bundle(unit, &mut diagnostics))
        .collect();
    let core_types = emitter.type_table(CORE_TYPES, &plan.core_types, &mut diagnostics);
    let extension_types =
        emitter.type_table(EXTENSION_TYPES, &plan.extension_types, &mut diagnostics);

    if options.mode == ResolveMode::Strict && !diagnostics.unresolved_references().is_empty() {
        return Err(ResolveError::Unresolved(diagnostics.into_unresolved()));
    }

    Ok(Output {
        bundles,
        core_types,
        extension_types,
        diagnostics,
    })
}
