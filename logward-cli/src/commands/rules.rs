//! `logward rules` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use logward_core::config::LogwardConfig;
use logward_engine::{RuleLoader, RuleStore, RuleStoreBuilder};

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config: &LogwardConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List { path } => {
            let dir = rules_dir(path, config);
            let report = list(&dir).await?;
            writer.render(&report)
        }
        RulesAction::Validate { path } => {
            let dir = rules_dir(path, config);
            let report = validate(&dir, config).await?;
            writer.render(&report)?;
            if !report.errors.is_empty() {
                return Err(CliError::Rule(format!(
                    "{} pattern(s) failed to compile",
                    report.errors.len()
                )));
            }
            Ok(())
        }
    }
}

fn rules_dir(path: Option<PathBuf>, config: &LogwardConfig) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from(&config.engine.rules_dir))
}

/// Load every rule under `dir` and describe it.
pub async fn list(dir: &Path) -> Result<RuleListReport, CliError> {
    info!(rules_dir = %dir.display(), "loading detection rules");

    let rules = RuleLoader::load_directory(dir).await?;
    Ok(RuleListReport {
        path: dir.display().to_string(),
        total: rules.len(),
        rules: rules
            .into_iter()
            .map(|r| RuleEntry {
                patterns: r.patterns.len(),
                id: r.id,
                level: r.level,
                module: r.module,
                description: r.description,
            })
            .collect(),
    })
}

/// Load and compile every rule under `dir`, collecting compile errors.
///
/// Uses the `[engine]` regex size limit so results match what `run` would compile.
pub async fn validate(dir: &Path, config: &LogwardConfig) -> Result<RuleValidationReport, CliError> {
    info!(path = %dir.display(), "validating detection rules");

    let rules = RuleLoader::load_directory(dir).await?;
    let store = RuleStoreBuilder::from_core(&config.engine).build(rules);
    Ok(RuleValidationReport::from_store(dir, &store))
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub path: String,
    pub total: usize,
    pub rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
pub struct RuleEntry {
    pub id: String,
    pub level: u32,
    pub module: String,
    pub patterns: usize,
    pub description: String,
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Detection Rules in {} ({} total)",
            self.path,
            self.total.to_string().bold()
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<12} {:<6} {:<16} {:<9} Description",
            "ID", "Level", "Module", "Patterns"
        )?;
        writeln!(w, "{}", "-".repeat(80))?;

        for r in &self.rules {
            let level = r.level.to_string();
            let level_colored = match r.level {
                12.. => level.red(),
                7..=11 => level.yellow(),
                _ => level.normal(),
            };
            let patterns = r.patterns.to_string();
            let patterns_colored = if r.patterns == 0 {
                patterns.dimmed()
            } else {
                patterns.normal()
            };

            writeln!(
                w,
                "{:<12} {:<6} {:<16} {:<9} {}",
                r.id, level_colored, r.module, patterns_colored, r.description
            )?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub rules: usize,
    pub patterns: usize,
    pub rules_with_errors: usize,
    pub inert_rules: usize,
    pub errors: Vec<PatternError>,
}

#[derive(Serialize)]
pub struct PatternError {
    pub rule_id: String,
    pub pattern: String,
    pub error: String,
}

impl RuleValidationReport {
    fn from_store(dir: &Path, store: &RuleStore) -> Self {
        Self {
            path: dir.display().to_string(),
            rules: store.rule_count(),
            patterns: store.pattern_count(),
            rules_with_errors: store.rules_skipped(),
            inert_rules: store.inert_rules(),
            errors: store
                .compile_errors()
                .iter()
                .map(|e| PatternError {
                    rule_id: e.rule_id.clone(),
                    pattern: e.pattern.clone(),
                    error: e.reason.clone(),
                })
                .collect(),
        }
    }
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Rules: {} total, {} with errors, {} without usable patterns",
            self.rules,
            if self.rules_with_errors > 0 {
                self.rules_with_errors.to_string().red()
            } else {
                self.rules_with_errors.to_string().green()
            },
            self.inert_rules
        )?;
        writeln!(w, "  Patterns compiled: {}", self.patterns)?;

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                writeln!(w, "  {} {:?}: {}", e.rule_id.red(), e.pattern, e.error)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logward_core::types::Rule;

    fn render(report: &impl Render) -> String {
        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_validation_report_from_store() {
        let store = RuleStore::build([
            Rule::new("100001").with_pattern("failed password"),
            Rule::new("100002").with_pattern("(unclosed"),
        ]);
        let report = RuleValidationReport::from_store(Path::new("rules"), &store);

        assert_eq!(report.rules, 2);
        assert_eq!(report.patterns, 1);
        assert_eq!(report.rules_with_errors, 1);
        assert_eq!(report.inert_rules, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].rule_id, "100002");
        assert_eq!(report.errors[0].pattern, "(unclosed");

        let text = render(&report);
        assert!(text.contains("Rule Validation"));
        assert!(text.contains("100002"));
    }

    #[test]
    fn test_rule_list_render_text() {
        let report = RuleListReport {
            path: "rules".to_owned(),
            total: 1,
            rules: vec![RuleEntry {
                id: "100001".to_owned(),
                level: 10,
                module: "sshd".to_owned(),
                patterns: 2,
                description: "SSH authentication failure".to_owned(),
            }],
        };

        let text = render(&report);
        assert!(text.contains("Detection Rules"));
        assert!(text.contains("100001"));
        assert!(text.contains("sshd"));
        assert!(text.contains("SSH authentication failure"));
    }

    #[test]
    fn test_rule_list_json_shape() {
        let report = RuleListReport {
            path: "rules".to_owned(),
            total: 0,
            rules: Vec::new(),
        };
        let json = serde_json::to_value(&report).expect("should serialize");
        assert_eq!(json["total"], 0);
        assert!(json["rules"].as_array().is_some_and(Vec::is_empty));
    }
}
