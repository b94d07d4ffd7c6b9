//! Persisted command macros.
//!
//! A macro is a named sequence of commands with optional `{param}`
//! placeholders. Definitions live in two files under the data directory:
//! `macros.txt` holds the step lines in a hand-editable shell-ish format,
//! and `macros-metadata.json` carries what that format cannot (parameter
//! declarations, descriptions, timestamps). The text file is the source of
//! truth; metadata entries without a matching line are dropped on the next
//! write.
//!
//! Line format, one macro per line:
//!
//! ```text
//! goodnight = Bedroom volume 15 : Bedroom play_favourite "Rain Sounds"
//! ```
//!
//! Tokens follow shell quoting rules; a bare `:` token separates steps. A
//! literal `:` argument therefore cannot be expressed and is rejected at
//! save time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::command::RunCommand;
use crate::error::AppError;
use crate::model::{
    MacroDefinition, MacroExecuteRequest, MacroExecutionResult, MacroParameter, MacroStep,
};
use crate::persist::{atomic_write, read_json, write_json};

/// Sidecar record per macro. Timestamps are RFC 3339.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MacroMetadata {
    description: Option<String>,
    parameters: Vec<MacroParameter>,
    created_at: Option<String>,
    modified_at: Option<String>,
}

pub struct MacroEngine {
    macros_path: PathBuf,
    metadata_path: PathBuf,
    runner: Arc<dyn RunCommand>,
    // Serializes read-modify-write cycles over the two files.
    write_lock: tokio::sync::Mutex<()>,
}

impl MacroEngine {
    pub fn new(macros_path: PathBuf, metadata_path: PathBuf, runner: Arc<dyn RunCommand>) -> Self {
        Self {
            macros_path,
            metadata_path,
            runner,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// All macros in file order.
    pub fn list(&self) -> Result<Vec<MacroDefinition>, AppError> {
        let lines = self.load_lines()?;
        let metadata = self.load_metadata();
        Ok(lines
            .into_iter()
            .map(|(name, steps)| definition(name, steps, &metadata))
            .collect())
    }

    pub fn get(&self, name: &str) -> Result<MacroDefinition, AppError> {
        self.list()?
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AppError::MacroNotFound {
                name: name.to_string(),
            })
    }

    /// Create a macro, or replace the definition under the same name.
    /// `createdAt` survives an update; `modifiedAt` always moves.
    pub async fn create_or_update(&self, definition: MacroDefinition) -> Result<(), AppError> {
        validate_definition(&definition)?;
        let _guard = self.write_lock.lock().await;

        let mut lines = self.load_lines()?;
        let mut metadata = self.load_metadata();
        let now = Local::now().to_rfc3339();

        let entry = metadata.entry(definition.name.clone()).or_default();
        if entry.created_at.is_none() {
            entry.created_at = Some(now.clone());
        }
        entry.modified_at = Some(now);
        entry.description = definition.description.clone();
        entry.parameters = definition.parameters.clone();

        match lines.iter_mut().find(|(name, _)| *name == definition.name) {
            Some((_, steps)) => *steps = definition.steps,
            None => lines.push((definition.name, definition.steps)),
        }

        self.store(&lines, metadata)
    }

    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        let mut lines = self.load_lines()?;
        let before = lines.len();
        lines.retain(|(n, _)| n != name);
        if lines.len() == before {
            return Err(AppError::MacroNotFound {
                name: name.to_string(),
            });
        }

        let mut metadata = self.load_metadata();
        metadata.remove(name);
        self.store(&lines, metadata)
    }

    /// Copy an existing macro under a new name. The copy gets fresh
    /// timestamps; the target name must be free.
    pub async fn duplicate(&self, name: &str, new_name: &str) -> Result<MacroDefinition, AppError> {
        let mut copy = self.get(name)?;
        if self.get(new_name).is_ok() {
            return Err(AppError::MacroValidation {
                message: format!("macro '{new_name}' already exists"),
            });
        }
        copy.name = new_name.to_string();
        self.create_or_update(copy).await?;
        self.get(new_name)
    }

    /// Raw contents of the macro file, for backup and hand editing.
    pub fn export(&self) -> Result<String, AppError> {
        match std::fs::read_to_string(&self.macros_path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge macro lines in the text format into the store. Same-name macros
    /// are replaced; parse failures reject the whole import so a bad paste
    /// never half-applies. Returns how many macros were imported.
    pub async fn import(&self, text: &str) -> Result<usize, AppError> {
        let mut imported = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(parsed) = parse_line(line) else {
                return Err(AppError::MacroValidation {
                    message: format!("unparsable macro line: {line}"),
                });
            };
            imported.push(parsed);
        }

        let _guard = self.write_lock.lock().await;
        let mut lines = self.load_lines()?;
        let metadata = self.load_metadata();
        let count = imported.len();
        for (name, steps) in imported {
            match lines.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => *existing = steps,
                None => lines.push((name, steps)),
            }
        }
        // store() synthesizes metadata for the newly imported names
        self.store(&lines, metadata)?;
        Ok(count)
    }

    /// Run a macro's steps in order, stopping at the first failure.
    ///
    /// Parameter validation happens up front: an unknown supplied parameter,
    /// or a referenced parameter with neither a value nor a default, rejects
    /// the whole run before any step is dispatched.
    pub async fn execute(
        &self,
        request: &MacroExecuteRequest,
    ) -> Result<MacroExecutionResult, AppError> {
        let definition = self.get(&request.macro_name)?;
        let values = resolve_parameters(&definition, &request.parameters)?;

        let mut steps = Vec::with_capacity(definition.steps.len());
        let mut failed_step_index = None;

        for (index, step) in definition.steps.iter().enumerate() {
            let speaker = substitute(&step.speaker, &values);
            let action = substitute(&step.action, &values);
            let args: Vec<String> = step.args.iter().map(|a| substitute(a, &values)).collect();

            let result = self.runner.run(&speaker, &action, &args).await;
            let success = result.is_success();
            steps.push(result);
            if !success {
                log::warn!(
                    "macro '{}' stopped at step {index} ('{action}' on '{speaker}')",
                    request.macro_name
                );
                failed_step_index = Some(index);
                break;
            }
        }

        Ok(MacroExecutionResult {
            macro_name: request.macro_name.clone(),
            succeeded: failed_step_index.is_none(),
            failed_step_index,
            steps,
        })
    }

    // ── Persistence ──────────────────────────────────────────────────────

    fn load_lines(&self) -> Result<Vec<(String, Vec<MacroStep>)>, AppError> {
        let text = match std::fs::read_to_string(&self.macros_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut macros = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some(parsed) => macros.push(parsed),
                None => log::warn!("skipping malformed macro line: {line}"),
            }
        }
        Ok(macros)
    }

    fn load_metadata(&self) -> HashMap<String, MacroMetadata> {
        read_json(&self.metadata_path).unwrap_or_default()
    }

    fn store(
        &self,
        lines: &[(String, Vec<MacroStep>)],
        mut metadata: HashMap<String, MacroMetadata>,
    ) -> Result<(), AppError> {
        // A metadata entry without a definition line, or a line without a
        // sidecar record, is evidence of a partial write (or a hand edit).
        // Reconcile both directions: stale metadata is dropped, missing
        // metadata is synthesized.
        metadata.retain(|name, _| lines.iter().any(|(n, _)| n == name));
        let now = Local::now().to_rfc3339();
        for (name, _) in lines {
            metadata.entry(name.clone()).or_insert_with(|| MacroMetadata {
                created_at: Some(now.clone()),
                modified_at: Some(now.clone()),
                ..MacroMetadata::default()
            });
        }

        let mut text = String::new();
        for (name, steps) in lines {
            text.push_str(&format_line(name, steps));
            text.push('\n');
        }

        atomic_write(&self.macros_path, text.as_bytes())?;
        write_json(&self.metadata_path, &metadata)?;
        Ok(())
    }
}

fn definition(
    name: String,
    steps: Vec<MacroStep>,
    metadata: &HashMap<String, MacroMetadata>,
) -> MacroDefinition {
    let meta = metadata.get(&name).cloned().unwrap_or_default();
    MacroDefinition {
        name,
        description: meta.description,
        parameters: meta.parameters,
        steps,
    }
}

/// `name = speaker action args... [: speaker action args...]`
fn parse_line(line: &str) -> Option<(String, Vec<MacroStep>)> {
    let tokens = shlex::split(line)?;
    let mut tokens = tokens.into_iter();
    let name = tokens.next()?;
    if tokens.next()? != "=" {
        return None;
    }

    let mut steps = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for token in tokens.chain(std::iter::once(":".to_string())) {
        if token == ":" {
            if !current.is_empty() {
                steps.push(step_from_tokens(std::mem::take(&mut current))?);
            }
        } else {
            current.push(token);
        }
    }

    (!steps.is_empty()).then_some((name, steps))
}

fn step_from_tokens(mut tokens: Vec<String>) -> Option<MacroStep> {
    if tokens.len() < 2 {
        return None;
    }
    let args = tokens.split_off(2);
    let action = tokens.pop()?;
    let speaker = tokens.pop()?;
    Some(MacroStep {
        speaker,
        action,
        args,
    })
}

fn format_line(name: &str, steps: &[MacroStep]) -> String {
    let rendered: Vec<String> = steps
        .iter()
        .map(|step| {
            let mut tokens = vec![step.speaker.clone(), step.action.clone()];
            tokens.extend(step.args.iter().cloned());
            tokens
                .iter()
                .map(|t| quote(t))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    format!("{name} = {}", rendered.join(" : "))
}

/// Tokens that shlex would split, comment out, or mangle must be wrapped.
/// `{param}` references and plain words stay bare so the file remains
/// hand-editable.
fn needs_quoting(token: &str) -> bool {
    token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '#'))
}

fn quote(token: &str) -> String {
    if needs_quoting(token) {
        let escaped = token.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        token.to_string()
    }
}

fn validate_definition(definition: &MacroDefinition) -> Result<(), AppError> {
    let name = &definition.name;
    if name.is_empty() || name.contains(char::is_whitespace) || name.contains('=') {
        return Err(AppError::MacroValidation {
            message: format!("invalid macro name '{name}'"),
        });
    }
    if definition.steps.is_empty() {
        return Err(AppError::MacroValidation {
            message: "a macro needs at least one step".to_string(),
        });
    }
    for step in &definition.steps {
        let tokens = std::iter::once(&step.speaker)
            .chain(std::iter::once(&step.action))
            .chain(step.args.iter());
        for token in tokens {
            if token == ":" {
                return Err(AppError::MacroValidation {
                    message: "a literal ':' token cannot be stored in a macro step".to_string(),
                });
            }
        }
        if step.speaker.is_empty() || step.action.is_empty() {
            return Err(AppError::MacroValidation {
                message: "every step needs a speaker and an action".to_string(),
            });
        }
    }
    Ok(())
}

/// Final parameter values for one run: supplied values win, declared
/// defaults fill the gaps, anything else is an error.
fn resolve_parameters(
    definition: &MacroDefinition,
    supplied: &HashMap<String, String>,
) -> Result<HashMap<String, String>, AppError> {
    for name in supplied.keys() {
        if !definition.parameters.iter().any(|p| &p.name == name) {
            return Err(AppError::MacroValidation {
                message: format!(
                    "macro '{}' has no parameter '{name}'",
                    definition.name
                ),
            });
        }
    }

    let mut values = HashMap::new();
    for parameter in &definition.parameters {
        match supplied.get(&parameter.name).or(parameter.default.as_ref()) {
            Some(value) => {
                values.insert(parameter.name.clone(), value.clone());
            }
            None => {
                return Err(AppError::MacroValidation {
                    message: format!(
                        "missing value for parameter '{}' of macro '{}'",
                        parameter.name, definition.name
                    ),
                });
            }
        }
    }
    Ok(values)
}

/// Replace `{param}` occurrences. Unmatched braces pass through untouched.
fn substitute(text: &str, values: &HashMap<String, String>) -> String {
    let mut out = text.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
