//! The target wizard as the Injector sees it.

use anyhow::Result;
use async_trait::async_trait;
use model_relay::TriggerGroups;

/// Free-text fields of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    DisplayName,
    Description,
    VersionName,
}

impl FormField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DisplayName => "display name",
            Self::Description => "description",
            Self::VersionName => "version name",
        }
    }
}

/// Option-menu controls of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChoiceControl {
    ModelType,
    Category,
    BaseModel,
}

impl ChoiceControl {
    /// The field label the control sits under.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModelType => "type",
            Self::Category => "category",
            Self::BaseModel => "base model",
        }
    }
}

/// Which step-two landmarks are currently rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Step2Landmarks {
    pub version_field: bool,
    pub base_model_control: bool,
    pub add_group_control: bool,
}

impl Step2Landmarks {
    /// Step two has rendered once all three are present together.
    pub fn all_present(&self) -> bool {
        self.version_field && self.base_model_control && self.add_group_control
    }
}

/// Primitive operations on the target wizard.
///
/// Methods returning `bool` report whether the element they act on was
/// found. Errors are reserved for a broken page connection.
#[async_trait]
pub trait WizardPage: Send + Sync {
    /// Replace a text field's value and notify the form.
    async fn set_field(&self, field: FormField, value: &str) -> Result<bool>;

    /// Open the option menu of a choice control.
    async fn open_choices(&self, control: ChoiceControl) -> Result<bool>;
    /// Texts of the options currently offered, in display order.
    async fn choice_labels(&self) -> Result<Vec<String>>;
    /// Click the option at `index` of [`WizardPage::choice_labels`].
    async fn pick_choice(&self, index: usize) -> Result<bool>;
    /// Dismiss an open option menu without choosing.
    async fn close_choices(&self) -> Result<()>;

    /// Click the wizard's "next" control.
    async fn advance(&self) -> Result<bool>;
    async fn step2_landmarks(&self) -> Result<Step2Landmarks>;

    /// Click the "add trigger group" control.
    async fn add_trigger_group(&self) -> Result<bool>;
    /// Number of trigger-group inputs. Each group owns two: name, then words.
    async fn trigger_input_count(&self) -> Result<usize>;
    /// Commit one word into the trigger input at `input_index`, followed by
    /// a comma keystroke.
    async fn commit_word(&self, input_index: usize, word: &str) -> Result<bool>;

    /// Show the status overlay with one pending row per group.
    async fn show_overlay(&self, groups: &TriggerGroups) -> Result<()>;
    async fn mark_group(&self, index: usize, ok: bool, reason: Option<&str>) -> Result<()>;
    async fn set_overlay_status(&self, text: &str) -> Result<()>;
    async fn fade_overlay(&self, delay_ms: u64) -> Result<()>;
}
