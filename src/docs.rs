use std::collections::BTreeMap;

/// Supplier of pre-rendered documentation. The generator treats the strings as opaque.
pub trait DocSource {
    fn command_doc(&self, name: &str) -> Option<String>;
    fn struct_doc(&self, name: &str) -> Option<String>;
}

/// No documentation at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocs;

impl DocSource for NoDocs {
    fn command_doc(&self, _name: &str) -> Option<String> {
        None
    }

    fn struct_doc(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Documentation held in memory, keyed by command or struct name.
#[derive(Debug, Clone, Default)]
pub struct DocMap {
    commands: BTreeMap<String, String>,
    structs: BTreeMap<String, String>,
}

impl DocMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_command<N: Into<String>, D: Into<String>>(&mut self, name: N, doc: D) {
        self.commands.insert(name.into(), doc.into());
    }

    pub fn insert_struct<N: Into<String>, D: Into<String>>(&mut self, name: N, doc: D) {
        self.structs.insert(name.into(), doc.into());
    }
}

impl DocSource for DocMap {
    fn command_doc(&self, name: &str) -> Option<String> {
        self.commands.get(name).cloned()
    }

    fn struct_doc(&self, name: &str) -> Option<String> {
        self.structs.get(name).cloned()
    }
}
