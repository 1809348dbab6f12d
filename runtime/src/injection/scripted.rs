//! An in-memory wizard that behaves like the target form.
//!
//! Step two appears a configurable number of landmark polls after "next" is
//! clicked, option menus serve fixed label lists, and each "add group"
//! click appends a name input and a words input.

use super::page::{ChoiceControl, FormField, Step2Landmarks, WizardPage};
use anyhow::Result;
use async_trait::async_trait;
use model_relay::TriggerGroups;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Overlay row state as last reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayMark {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Default)]
struct State {
    fields: HashMap<FormField, String>,
    choices: HashMap<ChoiceControl, Vec<String>>,
    picked: HashMap<ChoiceControl, String>,
    open_menu: Option<ChoiceControl>,
    menu_opens: HashMap<ChoiceControl, usize>,
    empty_opens: HashMap<ChoiceControl, usize>,
    advanced: bool,
    step2_after: Option<usize>,
    landmark_polls: usize,
    trigger_inputs: Vec<String>,
    add_clicks: usize,
    broken_groups: HashSet<usize>,
    single_input_groups: bool,
    overlay: Vec<OverlayMark>,
    statuses: Vec<String>,
    faded: bool,
}

/// Scripted [`WizardPage`] for tests and dry runs.
pub struct ScriptedWizard {
    state: Mutex<State>,
}

impl Default for ScriptedWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedWizard {
    /// A wizard whose step two renders right after "next".
    pub fn new() -> Self {
        let state = State {
            step2_after: Some(0),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Options served by a control's menu.
    pub fn with_choices(self, control: ChoiceControl, labels: &[&str]) -> Self {
        self.lock()
            .choices
            .insert(control, labels.iter().map(|l| l.to_string()).collect());
        self
    }

    /// The first `n` openings of a control's menu render no options yet.
    pub fn with_slow_menu(self, control: ChoiceControl, n: usize) -> Self {
        self.lock().empty_opens.insert(control, n);
        self
    }

    /// Step two renders after `polls` landmark probes; `None` means never.
    pub fn with_step2_after(self, polls: Option<usize>) -> Self {
        self.lock().step2_after = polls;
        self
    }

    /// The add-group click for group `index` creates no inputs.
    pub fn with_broken_group(self, index: usize) -> Self {
        self.lock().broken_groups.insert(index);
        self
    }

    /// Each add click renders only the words input, without its pair.
    pub fn with_single_input_groups(self) -> Self {
        self.lock().single_input_groups = true;
        self
    }

    pub fn field(&self, field: FormField) -> Option<String> {
        self.lock().fields.get(&field).cloned()
    }

    pub fn picked(&self, control: ChoiceControl) -> Option<String> {
        self.lock().picked.get(&control).cloned()
    }

    pub fn menu_opens(&self, control: ChoiceControl) -> usize {
        self.lock().menu_opens.get(&control).copied().unwrap_or(0)
    }

    pub fn advanced(&self) -> bool {
        self.lock().advanced
    }

    /// Values of every trigger input, name and words fields interleaved.
    pub fn trigger_inputs(&self) -> Vec<String> {
        self.lock().trigger_inputs.clone()
    }

    /// Values of the words fields only.
    pub fn word_fields(&self) -> Vec<String> {
        self.lock()
            .trigger_inputs
            .iter()
            .skip(1)
            .step_by(2)
            .cloned()
            .collect()
    }

    pub fn overlay(&self) -> Vec<OverlayMark> {
        self.lock().overlay.clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.lock().statuses.clone()
    }

    pub fn faded(&self) -> bool {
        self.lock().faded
    }

    fn step2_visible(state: &State) -> bool {
        match state.step2_after {
            Some(n) => state.advanced && state.landmark_polls > n,
            None => false,
        }
    }
}

#[async_trait]
impl WizardPage for ScriptedWizard {
    async fn set_field(&self, field: FormField, value: &str) -> Result<bool> {
        let mut state = self.lock();
        if field == FormField::VersionName && !Self::step2_visible(&state) {
            return Ok(false);
        }
        state.fields.insert(field, value.to_string());
        Ok(true)
    }

    async fn open_choices(&self, control: ChoiceControl) -> Result<bool> {
        let mut state = self.lock();
        if !state.choices.contains_key(&control) {
            return Ok(false);
        }
        *state.menu_opens.entry(control).or_insert(0) += 1;
        state.open_menu = Some(control);
        Ok(true)
    }

    async fn choice_labels(&self) -> Result<Vec<String>> {
        let state = self.lock();
        let Some(control) = state.open_menu else {
            return Ok(Vec::new());
        };
        let opens = state.menu_opens.get(&control).copied().unwrap_or(0);
        let empty = state.empty_opens.get(&control).copied().unwrap_or(0);
        if opens <= empty {
            return Ok(Vec::new());
        }
        Ok(state.choices.get(&control).cloned().unwrap_or_default())
    }

    async fn pick_choice(&self, index: usize) -> Result<bool> {
        let mut state = self.lock();
        let Some(control) = state.open_menu.take() else {
            return Ok(false);
        };
        let Some(label) = state.choices.get(&control).and_then(|c| c.get(index)).cloned() else {
            return Ok(false);
        };
        state.picked.insert(control, label);
        Ok(true)
    }

    async fn close_choices(&self) -> Result<()> {
        self.lock().open_menu = None;
        Ok(())
    }

    async fn advance(&self) -> Result<bool> {
        self.lock().advanced = true;
        Ok(true)
    }

    async fn step2_landmarks(&self) -> Result<Step2Landmarks> {
        let mut state = self.lock();
        state.landmark_polls += 1;
        let visible = Self::step2_visible(&state);
        Ok(Step2Landmarks {
            version_field: visible,
            base_model_control: visible,
            add_group_control: visible,
        })
    }

    async fn add_trigger_group(&self) -> Result<bool> {
        let mut state = self.lock();
        if !Self::step2_visible(&state) {
            return Ok(false);
        }
        let group = state.add_clicks;
        state.add_clicks += 1;
        if !state.broken_groups.contains(&group) {
            if !state.single_input_groups {
                state.trigger_inputs.push(String::new());
            }
            state.trigger_inputs.push(String::new());
        }
        Ok(true)
    }

    async fn trigger_input_count(&self) -> Result<usize> {
        Ok(self.lock().trigger_inputs.len())
    }

    async fn commit_word(&self, input_index: usize, word: &str) -> Result<bool> {
        let mut state = self.lock();
        let Some(value) = state.trigger_inputs.get_mut(input_index) else {
            return Ok(false);
        };
        if !value.is_empty() {
            value.push_str(", ");
        }
        value.push_str(word);
        Ok(true)
    }

    async fn show_overlay(&self, groups: &TriggerGroups) -> Result<()> {
        self.lock().overlay = vec![OverlayMark::Pending; groups.len()];
        Ok(())
    }

    async fn mark_group(&self, index: usize, ok: bool, reason: Option<&str>) -> Result<()> {
        let mut state = self.lock();
        if let Some(mark) = state.overlay.get_mut(index) {
            *mark = if ok {
                OverlayMark::Succeeded
            } else {
                OverlayMark::Failed(reason.unwrap_or_default().to_string())
            };
        }
        Ok(())
    }

    async fn set_overlay_status(&self, text: &str) -> Result<()> {
        self.lock().statuses.push(text.to_string());
        Ok(())
    }

    async fn fade_overlay(&self, _delay_ms: u64) -> Result<()> {
        self.lock().faded = true;
        Ok(())
    }
}
