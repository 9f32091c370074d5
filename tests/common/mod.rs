//! Shared utilities for integration and load testing.

use std::fs;
use std::path::{Path, PathBuf};

use aaa_policy::config::ModuleConfig;
use aaa_policy::dictionary::Dictionary;
use aaa_policy::request::Request;
use aaa_policy::FilesModule;
use tempfile::TempDir;

/// A temporary directory holding policy files.
pub struct PolicyDir {
    dir: TempDir,
}

impl PolicyDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write (or overwrite) a file and return its path.
    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Module over one common users file keyed on the given attributes.
pub fn module(users: &Path, key: &[&str]) -> FilesModule {
    let config = ModuleConfig {
        key: key.iter().map(|k| k.to_string()).collect(),
        filename: Some(users.to_path_buf()),
        ..ModuleConfig::default()
    };
    FilesModule::new(config, Dictionary::builtin()).unwrap()
}

/// Request built from `(attribute, text)` pairs.
pub fn request(module: &FilesModule, attrs: &[(&str, &str)]) -> Request {
    let dict = module.dictionary();
    attrs.iter().fold(Request::new(), |req, (name, text)| {
        let def = dict.require(name).unwrap();
        let value = def.parse_value(text).unwrap();
        req.with_attr(def, value)
    })
}

/// Every value of a reply attribute, rendered as text.
pub fn reply_values(module: &FilesModule, req: &Request, name: &str) -> Vec<String> {
    let def = module.dictionary().require(name).unwrap();
    req.reply.all(&def).map(|a| def.format_value(&a.value)).collect()
}

/// Every value of a control attribute, rendered as text.
#[allow(dead_code)]
pub fn control_values(module: &FilesModule, req: &Request, name: &str) -> Vec<String> {
    let def = module.dictionary().require(name).unwrap();
    req.control.all(&def).map(|a| def.format_value(&a.value)).collect()
}
