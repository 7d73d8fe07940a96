use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use huefit_contracts::events::{EventPayload, SessionLog};
use huefit_contracts::images::EncodedImage;
use huefit_contracts::palette::normalize_hex;
use huefit_contracts::session::SessionState;
use serde_json::{json, Value};

use crate::adjust::Editor;
use crate::gateway::TryOnGateway;
use crate::intake;

/// The application root: owns the session state, the adjust stage, the
/// gateway, and the session log, and sequences every user action as
/// guard -> begin -> gateway call -> finish/fail. Gateway failures are
/// converted to a display string here and never propagate; only local I/O
/// problems surface as `Err`.
pub struct Studio {
    state: SessionState,
    gateway: Box<dyn TryOnGateway>,
    pending_edit: Option<Editor>,
    log: SessionLog,
}

impl Studio {
    pub fn new(gateway: Box<dyn TryOnGateway>, log: SessionLog) -> Result<Self> {
        log.emit(
            "session_started",
            payload(json!({ "gateway": gateway.name() })),
        )?;
        Ok(Self {
            state: SessionState::new(),
            gateway,
            pending_edit: None,
            log,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn in_adjust_stage(&self) -> bool {
        self.pending_edit.is_some()
    }

    /// Loads a portrait into the adjust stage. The session subject is only
    /// replaced once the stage is applied or canceled.
    pub fn load_subject(&mut self, path: &Path) -> Result<String> {
        let image = intake::load_image(path)?;
        self.log.emit(
            "subject_staged",
            payload(json!({ "source_name": image.source_name })),
        )?;
        let name = image.source_name.clone();
        self.pending_edit = Some(Editor::present(image));
        Ok(format!(
            "Loaded {name}. Tune with /brightness and /contrast, then /apply (or /cancel to keep it as-is)."
        ))
    }

    pub fn set_brightness(&mut self, percent: i64) -> Result<String> {
        let Some(editor) = self.pending_edit.as_mut() else {
            return Ok("No photo in the adjust stage. Load one with /subject first.".to_string());
        };
        editor.set_brightness(percent);
        Ok(format!("Brightness: {}%", editor.params().brightness()))
    }

    pub fn set_contrast(&mut self, percent: i64) -> Result<String> {
        let Some(editor) = self.pending_edit.as_mut() else {
            return Ok("No photo in the adjust stage. Load one with /subject first.".to_string());
        };
        editor.set_contrast(percent);
        Ok(format!("Contrast: {}%", editor.params().contrast()))
    }

    /// Commits the adjust stage: the filtered photo, re-encoded, becomes the
    /// session subject and invalidates everything downstream.
    pub fn apply_edit(&mut self) -> Result<String> {
        let Some(editor) = self.pending_edit.take() else {
            return Ok("Nothing to apply.".to_string());
        };
        let adjusted = !editor.params().is_neutral();
        let committed = editor.commit()?;
        self.log.emit(
            "subject_set",
            payload(json!({ "source_name": committed.source_name, "adjusted": adjusted })),
        )?;
        let name = committed.source_name.clone();
        self.state.set_subject(committed);
        Ok(format!("Subject set to {name}. Run /analyze for a palette."))
    }

    /// Cancels the adjust stage: the untouched original becomes the subject.
    pub fn cancel_edit(&mut self) -> Result<String> {
        let Some(editor) = self.pending_edit.take() else {
            return Ok("Nothing to cancel.".to_string());
        };
        let original = editor.cancel();
        self.log.emit(
            "subject_set",
            payload(json!({ "source_name": original.source_name, "adjusted": false })),
        )?;
        let name = original.source_name.clone();
        self.state.set_subject(original);
        Ok(format!("Subject set to {name} (unedited). Run /analyze for a palette."))
    }

    pub fn clear_subject(&mut self) -> Result<String> {
        self.pending_edit = None;
        self.state.clear_subject();
        self.log.emit("subject_cleared", EventPayload::new())?;
        Ok("Subject cleared.".to_string())
    }

    pub fn load_garment(&mut self, path: &Path) -> Result<String> {
        let image = intake::load_image(path)?;
        self.log.emit(
            "garment_set",
            payload(json!({ "source_name": image.source_name })),
        )?;
        let name = image.source_name.clone();
        self.state.set_garment(image);
        Ok(format!("Garment set to {name}."))
    }

    pub fn clear_garment(&mut self) -> Result<String> {
        self.state.clear_garment();
        self.log.emit("garment_cleared", EventPayload::new())?;
        Ok("Garment cleared.".to_string())
    }

    pub fn analyze(&mut self) -> Result<String> {
        let ticket = match self.state.begin_analysis() {
            Ok(ticket) => ticket,
            Err(refusal) => return Ok(format!("Cannot analyze: {}.", refusal.describe())),
        };
        self.log.emit("analysis_started", EventPayload::new())?;

        let portrait = self
            .state
            .subject()
            .cloned()
            .context("analysis began without a subject")?;
        match self.gateway.analyze_undertone(&portrait) {
            Ok(palette) => {
                let hexes: Vec<Value> = palette
                    .iter()
                    .map(|entry| Value::String(entry.hex.clone()))
                    .collect();
                if self.state.finish_analysis(ticket, palette) {
                    self.log
                        .emit("palette_ready", payload(json!({ "colors": hexes })))?;
                    Ok("Palette ready. Load a garment and /pick a color.".to_string())
                } else {
                    Ok("Analysis finished for a superseded photo; ignored.".to_string())
                }
            }
            Err(err) => {
                let message = err.to_string();
                if self.state.fail(ticket, message.clone()) {
                    self.log
                        .emit("analysis_failed", payload(json!({ "error": message })))?;
                }
                Ok(message)
            }
        }
    }

    /// `selector` is a 1-based palette row (requires a palette) or a raw hex
    /// color (does not).
    pub fn pick(&mut self, selector: &str) -> Result<String> {
        let target_hex = if let Ok(row) = selector.trim().parse::<usize>() {
            let Some(palette) = self.state.palette() else {
                return Ok("No palette yet. Run /analyze first.".to_string());
            };
            match row.checked_sub(1).and_then(|idx| palette.get(idx)) {
                Some(entry) => entry.hex.clone(),
                None => {
                    return Ok(format!(
                        "Pick a row between 1 and {} (or a hex color).",
                        palette.len()
                    ))
                }
            }
        } else {
            match normalize_hex(selector) {
                Some(hex) => hex,
                None => return Ok(format!("'{selector}' is not a palette row or hex color.")),
            }
        };

        let ticket = match self.state.begin_composition(target_hex.clone()) {
            Ok(ticket) => ticket,
            Err(refusal) => return Ok(format!("Cannot try on: {}.", refusal.describe())),
        };
        self.log.emit(
            "composition_started",
            payload(json!({ "color": target_hex })),
        )?;

        let person = self
            .state
            .subject()
            .cloned()
            .context("composition began without a subject")?;
        let garment = self
            .state
            .garment()
            .cloned()
            .context("composition began without a garment")?;
        match self.gateway.compose_try_on(&person, &garment, &target_hex) {
            Ok(result) => {
                if self.state.finish_composition(ticket, result) {
                    self.log
                        .emit("tryon_ready", payload(json!({ "color": target_hex })))?;
                    Ok(format!(
                        "Try-on ready in {target_hex}. /save to keep it, /hair to restyle."
                    ))
                } else {
                    Ok("Try-on finished for a superseded session; ignored.".to_string())
                }
            }
            Err(err) => {
                let message = err.to_string();
                if self.state.fail(ticket, message.clone()) {
                    self.log
                        .emit("composition_failed", payload(json!({ "error": message })))?;
                }
                Ok(message)
            }
        }
    }

    /// Restyles hair on the current result, replacing it in place.
    pub fn restyle(&mut self, style_description: &str) -> Result<String> {
        let ticket = match self.state.begin_restyle() {
            Ok(ticket) => ticket,
            Err(refusal) => return Ok(format!("Cannot restyle: {}.", refusal.describe())),
        };
        self.log.emit(
            "restyle_started",
            payload(json!({ "style": style_description })),
        )?;

        let photo = self
            .state
            .result()
            .cloned()
            .context("restyle began without a result")?;
        match self.gateway.restyle_hair(&photo, style_description) {
            Ok(result) => {
                if self.state.finish_restyle(ticket, result) {
                    self.log
                        .emit("restyle_ready", payload(json!({ "style": style_description })))?;
                    Ok("Hair restyled on the current result.".to_string())
                } else {
                    Ok("Restyle finished for a superseded session; ignored.".to_string())
                }
            }
            Err(err) => {
                let message = err.to_string();
                if self.state.fail(ticket, message.clone()) {
                    self.log
                        .emit("restyle_failed", payload(json!({ "error": message })))?;
                }
                Ok(message)
            }
        }
    }

    /// Writes the current result as a PNG-named artifact and returns its path.
    pub fn save_result(&self, dir: &Path) -> Result<PathBuf> {
        let Some(result) = self.state.result() else {
            bail!("no try-on result to save yet");
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("failed creating {}", dir.display()))?;
        let artifact = dir.join(format!("try-on-{}.png", timestamp_millis()));
        fs::write(&artifact, result.decode()?)
            .with_context(|| format!("failed to write {}", artifact.display()))?;
        self.log.emit(
            "result_saved",
            payload(json!({ "path": artifact.to_string_lossy() })),
        )?;
        Ok(artifact)
    }

    pub fn status_lines(&self) -> Vec<String> {
        let describe = |image: Option<&EncodedImage>| {
            image
                .map(|value| value.source_name.clone())
                .unwrap_or_else(|| "(none)".to_string())
        };
        let mut lines = vec![
            format!("subject: {}", describe(self.state.subject())),
            format!("garment: {}", describe(self.state.garment())),
            format!(
                "palette: {}",
                self.state
                    .palette()
                    .map(|palette| palette
                        .iter()
                        .map(|entry| entry.hex.as_str())
                        .collect::<Vec<_>>()
                        .join(" "))
                    .unwrap_or_else(|| "(none)".to_string())
            ),
            format!(
                "selected: {}",
                self.state.selected_color().unwrap_or("(none)")
            ),
            format!("result: {}", describe(self.state.result())),
        ];
        if self.in_adjust_stage() {
            lines.push("adjust stage: open (/apply or /cancel)".to_string());
        }
        if let Some(error) = self.state.error() {
            lines.push(format!("last error: {error}"));
        }
        lines
    }
}

fn payload(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
