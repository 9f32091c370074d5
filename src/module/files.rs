//! The users-file policy module.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use crate::config::{ConfigError, ModuleConfig, PolicyConfig};
use crate::dictionary::{ControlAttrs, Dictionary};
use crate::engine::{ConditionEvaluator, LegacyEvaluator, Matcher, Outcome};
use crate::error::{LookupError, PolicyError};
use crate::index::{IndexBuilder, KeyExtractor, UsersTable};
use crate::module::{Phase, PolicySet};
use crate::observability::metrics;
use crate::request::Request;
use crate::users::Parser;

/// Policy lookups against users files, with atomic reload.
///
/// Lookups load the published [`PolicySet`] and never block; a reload builds
/// a complete new set off to the side and swaps it in with one store.
pub struct FilesModule {
    config: ModuleConfig,
    dict: Dictionary,
    controls: ControlAttrs,
    extractor: KeyExtractor,
    evaluator: Arc<dyn ConditionEvaluator>,
    published: ArcSwap<PolicySet>,
    /// Serializes reloads so generations stay in step with stores.
    reload_lock: Mutex<()>,
}

impl FilesModule {
    /// Build the module with the classic check-item semantics.
    pub fn new(config: ModuleConfig, dict: Dictionary) -> Result<Self, PolicyError> {
        Self::with_evaluator(config, dict, Arc::new(LegacyEvaluator))
    }

    /// Build the module and load every configured file.
    ///
    /// Fails on an unusable key attribute before any file is read.
    pub fn with_evaluator(
        config: ModuleConfig,
        dict: Dictionary,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Result<Self, PolicyError> {
        let controls = ControlAttrs::resolve(&dict)?;
        let extractor = KeyExtractor::from_names(&dict, &config.key)?;

        tracing::info!(
            key = ?config.key,
            key_type = %extractor.key_type(),
            index = ?extractor.kind(),
            "Policy module configured"
        );

        let set = build_set(&config, &dict, &controls, &extractor, 1)?;
        record_set(&set);

        Ok(Self {
            config,
            dict,
            controls,
            extractor,
            evaluator,
            published: ArcSwap::from_pointee(set),
            reload_lock: Mutex::new(()),
        })
    }

    /// Build the dictionary and module described by a validated config.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigError> {
        let dict = config.dictionary.build().map_err(PolicyError::from)?;
        Ok(Self::new(config.module.clone(), dict)?)
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn key_extractor(&self) -> &KeyExtractor {
        &self.extractor
    }

    /// Currently published tables. Holding the `Arc` keeps them alive across reloads.
    pub fn policies(&self) -> Arc<PolicySet> {
        self.published.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.published.load().generation()
    }

    /// Re-read every configured file and publish the result.
    ///
    /// On any error the previously published set stays in service.
    /// Returns the new generation.
    pub fn reload(&self) -> Result<u64, PolicyError> {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.published.load().generation() + 1;

        match build_set(&self.config, &self.dict, &self.controls, &self.extractor, generation) {
            Ok(set) => {
                record_set(&set);
                tracing::info!(generation, entries = set.entries(), "Policy reloaded");
                self.published.store(Arc::new(set));
                metrics::record_reload(true);
                Ok(generation)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    generation = generation - 1,
                    "Policy reload failed, keeping current policy"
                );
                metrics::record_reload(false);
                Err(e)
            }
        }
    }

    /// Run one lookup for `phase`, applying reply edits to `request` on a match.
    pub fn process(&self, phase: Phase, request: &mut Request) -> Result<Outcome, LookupError> {
        let set = self.published.load_full();

        let Some(table) = set.table(phase) else {
            tracing::debug!(phase = %phase, "No policy file for phase");
            metrics::record_lookup(phase.as_str(), Outcome::NoMatch.as_str());
            return Ok(Outcome::NoMatch);
        };

        let key = self.extractor.extract(request);
        tracing::debug!(phase = %phase, file = table.filename(), key = ?key, "Looking up key");

        let result = Matcher::new(self.evaluator.as_ref()).run(table, key.as_ref(), request);
        match &result {
            Ok(outcome) => metrics::record_lookup(phase.as_str(), outcome.as_str()),
            Err(e) => {
                tracing::warn!(phase = %phase, error = %e, "Policy lookup failed");
                metrics::record_lookup(phase.as_str(), "failed");
            }
        }
        result
    }
}

fn build_set(
    config: &ModuleConfig,
    dict: &Dictionary,
    controls: &ControlAttrs,
    extractor: &KeyExtractor,
    generation: u64,
) -> Result<PolicySet, PolicyError> {
    let parser = Parser::new(dict);
    let builder = IndexBuilder::new(extractor, controls);

    let build = |path: &Path| -> Result<UsersTable, PolicyError> {
        let raw = parser.parse_file(path)?;
        builder.build(&path.display().to_string(), raw)
    };

    let common = config.filename.as_deref().map(build).transpose()?;
    let mut phases: [Option<UsersTable>; 4] = [None, None, None, None];
    for phase in Phase::ALL {
        phases[phase.slot()] = config.phase_file(phase).map(build).transpose()?;
    }

    Ok(PolicySet::new(generation, common, phases))
}

fn record_set(set: &PolicySet) {
    for table in set.tables() {
        metrics::record_entries(table.filename(), table.entries());
    }
    metrics::record_generation(set.generation());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Value;
    use std::fs;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn alice(module: &FilesModule) -> Request {
        let def = module.dictionary().require("User-Name").unwrap();
        Request::new().with_attr(def, Value::String("alice".into()))
    }

    fn reply_message(module: &FilesModule, req: &Request) -> Option<String> {
        let def = module.dictionary().require("Reply-Message").unwrap();
        req.reply.first(&def).map(|a| a.value.to_string())
    }

    #[test]
    fn test_sources_include_included_files() {
        let dir = tempfile::tempdir().unwrap();
        let extra = write(dir.path(), "users.extra", "bob\n\tReply-Message := \"bob\"\n");
        let users = write(
            dir.path(),
            "users",
            "alice\n\tReply-Message := \"alice\"\n$INCLUDE users.extra\n",
        );
        let config = ModuleConfig {
            filename: Some(users.clone()),
            ..ModuleConfig::default()
        };
        let module = FilesModule::new(config, Dictionary::builtin()).unwrap();

        let sources = module.policies().sources();
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&users));
        assert!(sources.contains(&extra));
    }

    #[test]
    fn test_phase_file_overrides_common() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModuleConfig {
            filename: Some(write(dir.path(), "users", "alice\n\tReply-Message := \"common\"\n")),
            auth_filename: Some(write(dir.path(), "users.auth", "alice\n\tReply-Message := \"auth\"\n")),
            ..ModuleConfig::default()
        };
        let module = FilesModule::new(config, Dictionary::builtin()).unwrap();
        assert_eq!(module.generation(), 1);
        assert_eq!(module.policies().tables().count(), 2);

        let mut req = alice(&module);
        assert_eq!(module.process(Phase::Recv, &mut req).unwrap(), Outcome::Matched);
        assert_eq!(reply_message(&module, &req).as_deref(), Some("common"));

        let mut req = alice(&module);
        assert_eq!(module.process(Phase::Authenticate, &mut req).unwrap(), Outcome::Matched);
        assert_eq!(reply_message(&module, &req).as_deref(), Some("auth"));
    }

    #[test]
    fn test_no_table_for_phase() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModuleConfig {
            send_filename: Some(write(dir.path(), "users.send", "DEFAULT\n\tReply-Message := \"x\"\n")),
            ..ModuleConfig::default()
        };
        let module = FilesModule::new(config, Dictionary::builtin()).unwrap();

        let mut req = alice(&module);
        assert_eq!(module.process(Phase::Recv, &mut req).unwrap(), Outcome::NoMatch);
        assert!(req.reply.is_empty());
        assert_eq!(module.process(Phase::Send, &mut req).unwrap(), Outcome::Matched);
    }

    #[test]
    fn test_reload_swaps_and_failure_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let users = write(dir.path(), "users", "alice\n\tReply-Message := \"v1\"\n");
        let config = ModuleConfig {
            filename: Some(users.clone()),
            ..ModuleConfig::default()
        };
        let module = FilesModule::new(config, Dictionary::builtin()).unwrap();
        let before = module.policies();

        fs::write(&users, "alice\n\tReply-Message := \"v2\"\n").unwrap();
        assert_eq!(module.reload().unwrap(), 2);

        let mut req = alice(&module);
        module.process(Phase::Recv, &mut req).unwrap();
        assert_eq!(reply_message(&module, &req).as_deref(), Some("v2"));

        // The old set is still usable by whoever holds it.
        assert_eq!(before.generation(), 1);
        assert!(before.table(Phase::Recv).is_some());

        fs::write(&users, "alice\n\tReply-Message := /re/\n").unwrap();
        let err = module.reload().unwrap_err();
        assert!(matches!(err, PolicyError::RegexOrExecNotAllowed { .. }));
        assert_eq!(module.generation(), 2);

        let mut req = alice(&module);
        module.process(Phase::Recv, &mut req).unwrap();
        assert_eq!(reply_message(&module, &req).as_deref(), Some("v2"));
    }

    #[test]
    fn test_bad_key_fails_before_reading_files() {
        let config = ModuleConfig {
            key: vec!["Vendor-Specific".to_string()],
            filename: Some(PathBuf::from("/nonexistent/users")),
            ..ModuleConfig::default()
        };
        let err = FilesModule::new(config, Dictionary::builtin()).err().unwrap();
        assert!(matches!(err, PolicyError::KeyType { .. }));
    }

    #[test]
    fn test_missing_file() {
        let config = ModuleConfig {
            filename: Some(PathBuf::from("/nonexistent/users")),
            ..ModuleConfig::default()
        };
        let err = FilesModule::new(config, Dictionary::builtin()).err().unwrap();
        assert!(matches!(err, PolicyError::Io { .. }));
    }
}
