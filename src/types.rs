use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;
use std::fmt;

/// In-memory model of the Vulkan registry.
///
/// Built once by the loader and never mutated afterwards. Tables keyed by name keep the
/// document order of the XML source, which later stages rely on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Registry {
    /// IDs of all known Vulkan vendors.
    pub vendor_ids: Vec<VendorId>,

    /// Known extension author tags.
    pub tags: Vec<Tag>,

    /// Windowing platforms and the macros guarding them.
    pub platforms: Vec<Platform>,

    /// All type definitions, in document order.
    pub types: IndexMap<String, Type>,

    /// Named value groups, in document order.
    pub enums: IndexMap<String, Enums>,

    /// All commands, in document order.
    pub commands: IndexMap<String, Command>,

    /// API levels, such as Vulkan 1.0 or 1.1.
    pub features: Vec<Feature>,

    /// Optional capabilities.
    pub extensions: Vec<Extension>,

    /// Type names present in the source that are deliberately not modeled.
    pub elided: IndexSet<String>,
}

impl Registry {
    pub fn type_named(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn value_group(&self, name: &str) -> Option<&Enums> {
        self.enums.get(name)
    }

    /// Looks up an API constant, i.e. a value from a group without a `type` attribute.
    pub fn constant(&self, name: &str) -> Option<&Enum> {
        self.enums
            .values()
            .filter(|group| group.kind == EnumsKind::Constants)
            .flat_map(|group| group.values.iter())
            .find(|value| value.name == name)
    }

    pub fn is_dispatchable_handle(&self, name: &str) -> bool {
        match self.types.get(name).map(|t| &t.kind) {
            Some(TypeKind::Handle {
                storage: HandleStorage::Dispatchable,
                ..
            }) => true,
            Some(TypeKind::Alias { target }) => self.is_dispatchable_handle(target),
            _ => false,
        }
    }
}

/// Unique identifier for a Vulkan vendor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct VendorId {
    pub name: String,
    pub id: u32,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
}

/// Suffix attached to extension names, indicating the author (KHR, EXT, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Tag {
    pub name: String,
    pub author: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Platform {
    pub name: String,
    /// C macro guarding platform-specific definitions.
    pub protect: String,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
}

//--------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Type {
    pub name: String,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
    pub kind: TypeKind,
}

/// Every category of type the registry can declare.
///
/// Consumers match on this exhaustively, so adding a variant is a compile-time checked
/// change across the resolver and the emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum TypeKind {
    /// Includes and preprocessor defines.
    Ignored,

    /// A type provided by the platform headers, e.g. `uint32_t`.
    SystemAlias { requires: Option<String> },

    /// `typedef <underlying> <name>;`
    BaseAlias { underlying: String },

    /// A type owned by a windowing system header, only ever handled by pointer or by value
    /// without inspection.
    PlatformOpaque { requires: Option<String> },

    /// Flags typedef. `requires` names the value group holding the flag bits, if any.
    Bitmask {
        underlying: String,
        requires: Option<String>,
    },

    Handle {
        parent: Option<String>,
        storage: HandleStorage,
    },

    EnumTag,

    FunctionPointer { ret: Field, params: Vec<Field> },

    Struct(Aggregate),

    Union(Aggregate),

    /// Another name for `target`, of whatever category `target` has.
    Alias { target: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum HandleStorage {
    /// `VK_DEFINE_HANDLE`: a pointer to an object carrying a dispatch table.
    Dispatchable,
    /// `VK_DEFINE_NON_DISPATCHABLE_HANDLE`: 64-bit opaque value.
    NonDispatchable,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Aggregate {
    pub members: Vec<Field>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub returned_only: bool,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub struct_extends: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
/// A struct member, command parameter or prototype, or function pointer argument.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Field {
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub modifier: Option<Modifier>,

    pub type_name: String,

    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub indirection: Indirection,

    pub name: String,

    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub array_shape: Option<Vec<ArrayLength>>,

    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub bitfield_size: Option<u8>,

    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub attributes: Attributes,

    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
}

impl Field {
    pub fn is_pointer(&self) -> bool {
        self.indirection != Indirection::Direct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Modifier {
    Const,
    Struct,
    ConstStruct,
    Enum,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Const => "const",
            Modifier::Struct => "struct",
            Modifier::ConstStruct => "const struct",
            Modifier::Enum => "enum",
        }
    }
}

/// Normalized pointer depth of a field.
///
/// Only the shapes that occur in the registry are representable; anything else is rejected
/// by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Indirection {
    Direct,
    /// `*`, `**`, ...
    Pointer(u8),
    /// `* const*`
    PointerToConstPointer,
}

impl Default for Indirection {
    fn default() -> Self {
        Indirection::Direct
    }
}

impl Indirection {
    /// Symbolic suffix used by the downstream generator. The vocabulary is fixed:
    /// `""`, `"ptr"`, `"ptr_ptr"`, ... and `"ptr_const_ptr"`.
    pub fn suffix(&self) -> String {
        match *self {
            Indirection::Direct => String::new(),
            Indirection::Pointer(depth) => vec!["ptr"; depth as usize].join("_"),
            Indirection::PointerToConstPointer => String::from("ptr_const_ptr"),
        }
    }

    pub fn depth(&self) -> u8 {
        match *self {
            Indirection::Direct => 0,
            Indirection::Pointer(depth) => depth,
            Indirection::PointerToConstPointer => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ArrayLength {
    Literal(u32),
    Constant(String),
}

impl fmt::Display for ArrayLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayLength::Literal(n) => write!(f, "{}", n),
            ArrayLength::Constant(name) => f.write_str(name),
        }
    }
}

/// Raw XML attributes of a member or parameter, kept verbatim.
///
/// Most of these are rarely consulted, so interpretation happens in the accessors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Attributes(pub BTreeMap<String, String>);

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of the `len` attribute, outermost first.
    pub fn lengths(&self) -> Vec<&str> {
        split_list(self.get("len"))
    }

    /// `optional="true"` or `optional="true,false"`; only the outermost level counts.
    pub fn is_optional(&self) -> bool {
        split_list(self.get("optional")).first() == Some(&"true")
    }

    pub fn extern_sync(&self) -> Option<&str> {
        match self.get("externsync") {
            Some("false") | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn no_auto_validity(&self) -> bool {
        self.get("noautovalidity") == Some("true")
    }

    pub fn valid_extension_structs(&self) -> Vec<&str> {
        split_list(self.get("validextensionstructs"))
    }
}

fn split_list(value: Option<&str>) -> Vec<&str> {
    match value {
        Some(v) => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

//--------------------------------------------------------------------------------------------------
/// A Vulkan function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Command {
    /// Return type and command name.
    pub proto: Field,
    pub params: Vec<Field>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub success_codes: Vec<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub error_codes: Vec<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub queues: Vec<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub render_pass: Option<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub cmd_buffer_level: Vec<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub implicit_extern_sync_params: Vec<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
    /// Set when this command was declared as `<command name=".." alias=".."/>`.
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub alias_of: Option<String>,
}

impl Command {
    pub fn name(&self) -> &str {
        &self.proto.name
    }

    pub fn return_type(&self) -> &str {
        &self.proto.type_name
    }
}

//--------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum EnumsKind {
    /// A group without `type`, holding API constants.
    Constants,
    Enum,
    Bitmask,
}

/// A named group of values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Enums {
    pub name: String,
    pub kind: EnumsKind,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub bitwidth: Option<u32>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
    pub values: Vec<Enum>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Enum {
    pub name: String,
    pub value: EnumValue,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum EnumValue {
    /// Value text exactly as written, e.g. `(~0ULL)` or `1000.0F`.
    Value(String),
    Bitpos(u32),
    Alias(String),
    /// Extension-relative value; only found in require blocks.
    Offset {
        offset: i64,
        extnumber: Option<i64>,
        negative: bool,
    },
}

impl EnumValue {
    /// Resolves an extension offset against the number of the extension introducing it.
    ///
    /// `None` when the result does not fit in an `i64`.
    pub fn offset_value(offset: i64, extnumber: i64, negative: bool) -> Option<i64> {
        let value = extnumber
            .checked_sub(1)?
            .checked_mul(1000)?
            .checked_add(1_000_000_000)?
            .checked_add(offset)?;
        if negative {
            value.checked_neg()
        } else {
            Some(value)
        }
    }
}

//--------------------------------------------------------------------------------------------------
/// Reference to a value from a require block. Either names an existing constant, or defines
/// a new value, optionally extending an existing enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EnumRef {
    pub name: String,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub extends: Option<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub value: Option<EnumValue>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
}

/// Raw child of a `<require>` element, before it is sorted into a [`Require`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceItem {
    Comment(String),
    Type(String),
    Enum(EnumRef),
    Command(String),
}

/// Items introduced together by a feature or extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Require {
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
    pub types: Vec<String>,
    pub enums: Vec<EnumRef>,
    pub commands: Vec<String>,
}

impl Require {
    /// Sorts the mixed children of a `<require>` element into the three reference lists.
    /// Relative document order is preserved within each list; comments are dropped.
    pub fn from_items(comment: Option<String>, items: Vec<InterfaceItem>) -> Require {
        let mut require = Require {
            comment,
            ..Require::default()
        };
        for item in items {
            match item {
                InterfaceItem::Comment(_) => (),
                InterfaceItem::Type(name) => require.types.push(name),
                InterfaceItem::Enum(e) => require.enums.push(e),
                InterfaceItem::Command(name) => require.commands.push(name),
            }
        }
        require
    }

    /// Appends the references of `other`, keeping the first comment.
    pub fn append(&mut self, other: Require) {
        if self.comment.is_none() {
            self.comment = other.comment;
        }
        self.types.extend(other.types);
        self.enums.extend(other.enums);
        self.commands.extend(other.commands);
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.enums.is_empty() && self.commands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Feature {
    pub api: Vec<String>,
    pub name: String,
    pub number: String,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
    pub requires: Vec<Require>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SupportStatus {
    Disabled,
    Supported(Vec<String>),
}

impl SupportStatus {
    pub fn parse(text: &str) -> SupportStatus {
        if text == "disabled" {
            SupportStatus::Disabled
        } else {
            SupportStatus::Supported(text.split(',').map(String::from).collect())
        }
    }

    pub fn is_supported(&self, api: &str) -> bool {
        match self {
            SupportStatus::Disabled => false,
            SupportStatus::Supported(apis) => apis.iter().any(|a| a == api),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Extension {
    pub name: String,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub number: Option<i64>,
    /// `instance` or `device`.
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub ext_type: Option<String>,
    pub supported: SupportStatus,
    /// Names of extensions or features this one depends on.
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub requires: Vec<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub platform: Option<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub protect: Option<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub promoted_to: Option<String>,
    #[cfg_attr(
        feature = "serialize",
        serde(default, skip_serializing_if = "is_default")
    )]
    pub comment: Option<String>,
    pub require: Require,
}

#[cfg(feature = "serialize")]
fn is_default<T: Default + Eq>(v: &T) -> bool {
    v.eq(&T::default())
}
