//! Injector: replays a [`ModelRecord`] into the two-step creation wizard.
//!
//! ```text
//! Step1 ──next──▶ WaitingForStep2 ──landmarks──▶ Step2 ──groups──▶ Done
//! ```
//!
//! The machine is linear. A step-two timeout fails the whole fill; a
//! missed option or a broken trigger group is logged and skipped. The
//! wizard is never advanced past step two.

pub mod browser;
pub mod page;
pub mod scripted;

use crate::wait::{await_condition, ensure_live, pause, WaitOutcome};
use anyhow::{bail, Result};
use model_relay::{best_match, exact_match, looks_like_tags, ModelRecord, RelayError};
use page::{ChoiceControl, FormField, WizardPage};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Overlay status line once every group has been attempted.
pub const DONE_STATUS: &str = "Done. Staying on page 2.";

/// Timing and retry knobs of a fill pass.
#[derive(Debug, Clone)]
pub struct InjectOptions {
    pub step2_timeout: Duration,
    pub step2_poll: Duration,
    /// Wait after opening an option menu before reading its options.
    pub menu_settle: Duration,
    pub fuzzy_attempts: u32,
    pub group_poll_attempts: u32,
    pub group_poll_interval: Duration,
    /// Random gap between committed words, inclusive bounds.
    pub word_gap_min: Duration,
    pub word_gap_max: Duration,
    /// Delay before the status overlay fades; `None` keeps it up.
    pub overlay_fade: Option<Duration>,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            step2_timeout: Duration::from_millis(15000),
            step2_poll: Duration::from_millis(400),
            menu_settle: Duration::from_millis(350),
            fuzzy_attempts: 4,
            group_poll_attempts: 20,
            group_poll_interval: Duration::from_millis(150),
            word_gap_min: Duration::from_millis(40),
            word_gap_max: Duration::from_millis(120),
            overlay_fade: Some(Duration::from_millis(8000)),
        }
    }
}

/// States of the fill machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardState {
    Step1,
    WaitingForStep2,
    Step2,
    Done,
}

/// Outcome of one trigger group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum GroupStatus {
    Pending,
    Succeeded,
    Failed(String),
}

impl GroupStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// What a completed fill did.
#[derive(Debug, Clone, Serialize)]
pub struct FillReport {
    pub state: WizardState,
    pub model_type: Option<String>,
    pub category: Option<String>,
    pub base_model: Option<String>,
    pub groups: Vec<GroupStatus>,
}

impl FillReport {
    fn new() -> Self {
        Self {
            state: WizardState::Step1,
            model_type: None,
            category: None,
            base_model: None,
            groups: Vec::new(),
        }
    }

    pub fn groups_succeeded(&self) -> usize {
        self.groups.iter().filter(|g| g.is_success()).count()
    }
}

/// Runs fill passes.
#[derive(Debug, Clone, Default)]
pub struct Injector {
    options: InjectOptions,
}

impl Injector {
    pub fn new(options: InjectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &InjectOptions {
        &self.options
    }

    /// Drive the wizard from step one through trigger-group creation.
    pub async fn fill(
        &self,
        page: &dyn WizardPage,
        record: &ModelRecord,
        cancel: &CancellationToken,
    ) -> Result<FillReport> {
        let mut report = FillReport::new();

        info!("fill: step 1");
        self.fill_step1(page, record, &mut report, cancel).await?;

        report.state = WizardState::WaitingForStep2;
        debug!("fill: waiting for step 2");
        self.wait_for_step2(page, cancel).await?;

        report.state = WizardState::Step2;
        info!("fill: step 2");
        self.fill_step2(page, record, &mut report, cancel).await?;

        report.state = WizardState::Done;
        info!(
            "fill: done, {}/{} trigger group(s) created",
            report.groups_succeeded(),
            report.groups.len()
        );
        Ok(report)
    }

    async fn fill_step1(
        &self,
        page: &dyn WizardPage,
        record: &ModelRecord,
        report: &mut FillReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !record.title.is_empty() {
            self.set_field(page, FormField::DisplayName, &record.title, cancel)
                .await?;
        }

        if record.has_model_type() {
            report.model_type = self
                .choose_exact(page, ChoiceControl::ModelType, &record.model_type, cancel)
                .await?;
        }
        if !record.category.is_empty() {
            report.category = self
                .choose_exact(page, ChoiceControl::Category, &record.category, cancel)
                .await?;
        }

        let description = if record.description.is_empty() || looks_like_tags(&record.description)
        {
            record.title.as_str()
        } else {
            record.description.as_str()
        };
        self.set_field(page, FormField::Description, description, cancel)
            .await?;

        ensure_live(cancel)?;
        if !page.advance().await? {
            warn!("no next control on step 1");
        }
        Ok(())
    }

    async fn wait_for_step2(&self, page: &dyn WizardPage, cancel: &CancellationToken) -> Result<()> {
        let outcome = await_condition(
            move || async move {
                let marks = page.step2_landmarks().await?;
                Ok::<_, anyhow::Error>(marks.all_present().then_some(()))
            },
            self.options.step2_timeout,
            self.options.step2_poll,
            cancel,
        )
        .await?;
        match outcome {
            WaitOutcome::Ready(()) => Ok(()),
            WaitOutcome::Cancelled => Err(RelayError::Cancelled.into()),
            WaitOutcome::TimedOut => Err(RelayError::Step2Timeout {
                timeout_ms: self.options.step2_timeout.as_millis() as u64,
            }
            .into()),
        }
    }

    async fn fill_step2(
        &self,
        page: &dyn WizardPage,
        record: &ModelRecord,
        report: &mut FillReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.set_field(page, FormField::VersionName, &record.version_name, cancel)
            .await?;

        if record.has_base_model() {
            report.base_model = self.choose_fuzzy(page, &record.base_model, cancel).await?;
        } else {
            debug!("base model unknown, leaving the selector untouched");
        }

        let groups = &record.trigger_groups;
        if groups.is_empty() {
            self.overlay_status(page, "No trigger groups captured.").await;
            return Ok(());
        }

        ensure_live(cancel)?;
        if let Err(e) = page.show_overlay(groups).await {
            warn!("could not show status overlay: {e:#}");
        }
        self.overlay_status(page, &format!("Creating {} group(s)\u{2026}", groups.len()))
            .await;

        for (index, words) in groups.iter().enumerate() {
            report.groups.push(GroupStatus::Pending);
            let status = match self.create_group(page, index, words, cancel).await {
                Ok(()) => {
                    debug!("group {} filled: {}", index + 1, words.join(", "));
                    GroupStatus::Succeeded
                }
                Err(e) if is_cancelled(&e) => return Err(e),
                Err(e) => {
                    warn!("group {} failed: {e:#}", index + 1);
                    GroupStatus::Failed(format!("{e:#}"))
                }
            };
            let (ok, reason) = match &status {
                GroupStatus::Failed(reason) => (false, Some(reason.as_str())),
                _ => (true, None),
            };
            if let Err(e) = page.mark_group(index, ok, reason).await {
                warn!("could not update overlay row {index}: {e:#}");
            }
            report.groups[index] = status;
        }

        self.overlay_status(page, DONE_STATUS).await;
        if let Some(delay) = self.options.overlay_fade {
            if let Err(e) = page.fade_overlay(delay.as_millis() as u64).await {
                warn!("could not schedule overlay fade: {e:#}");
            }
        }
        Ok(())
    }

    /// Create one group: click "add", wait for its two inputs, then commit
    /// the words into the newest words field.
    async fn create_group(
        &self,
        page: &dyn WizardPage,
        index: usize,
        words: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_live(cancel)?;
        let before = page.trigger_input_count().await?;
        if !page.add_trigger_group().await? {
            bail!("add trigger group control not found");
        }

        let attempts = self.options.group_poll_attempts.max(1);
        let outcome = await_condition(
            move || async move {
                let count = page.trigger_input_count().await?;
                Ok::<_, anyhow::Error>((count >= before + 2).then_some(count))
            },
            self.options.group_poll_interval * attempts,
            self.options.group_poll_interval,
            cancel,
        )
        .await?;
        let count = match outcome {
            WaitOutcome::Ready(count) => count,
            WaitOutcome::Cancelled => return Err(RelayError::Cancelled.into()),
            WaitOutcome::TimedOut => {
                warn!("group {}: inputs did not appear, using what is present", index + 1);
                page.trigger_input_count().await?
            }
        };
        if count <= before {
            bail!("word input not found");
        }

        let target = count - 1;
        for (n, word) in words.iter().enumerate() {
            if n > 0 {
                pause(self.word_gap(), cancel).await?;
            } else {
                ensure_live(cancel)?;
            }
            if !page.commit_word(target, word).await? {
                bail!("word input disappeared");
            }
        }
        Ok(())
    }

    /// Open a menu and pick the option whose normalized text equals `wanted`.
    async fn choose_exact(
        &self,
        page: &dyn WizardPage,
        control: ChoiceControl,
        wanted: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        ensure_live(cancel)?;
        if !page.open_choices(control).await? {
            warn!("no {} control found", control.label());
            return Ok(None);
        }
        pause(self.options.menu_settle, cancel).await?;
        let labels = page.choice_labels().await?;
        if let Some(i) = exact_match(wanted, &labels) {
            if page.pick_choice(i).await? {
                debug!("{} set to '{}'", control.label(), labels[i]);
                return Ok(Some(labels[i].clone()));
            }
        }
        warn!("no {} option matches '{wanted}'", control.label());
        page.close_choices().await?;
        Ok(None)
    }

    /// Fuzzy-pick the base model, reopening the menu between attempts.
    async fn choose_fuzzy(
        &self,
        page: &dyn WizardPage,
        wanted: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let control = ChoiceControl::BaseModel;
        let attempts = self.options.fuzzy_attempts.max(1);
        for attempt in 1..=attempts {
            ensure_live(cancel)?;
            if !page.open_choices(control).await? {
                warn!("no base model control found");
                return Ok(None);
            }
            pause(self.options.menu_settle, cancel).await?;
            let labels = page.choice_labels().await?;
            if let Some(i) = best_match(wanted, &labels) {
                if page.pick_choice(i).await? {
                    info!("base model '{wanted}' matched '{}'", labels[i]);
                    return Ok(Some(labels[i].clone()));
                }
            }
            debug!(
                "base model attempt {attempt}/{attempts}: no match among {} option(s)",
                labels.len()
            );
            page.close_choices().await?;
        }
        warn!("base model '{wanted}' not matched after {attempts} attempt(s), leaving default");
        Ok(None)
    }

    async fn set_field(
        &self,
        page: &dyn WizardPage,
        field: FormField,
        value: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_live(cancel)?;
        if !page.set_field(field, value).await? {
            warn!("{} field not found", field.label());
        }
        Ok(())
    }

    async fn overlay_status(&self, page: &dyn WizardPage, text: &str) {
        if let Err(e) = page.set_overlay_status(text).await {
            warn!("could not update overlay status: {e:#}");
        }
    }

    fn word_gap(&self) -> Duration {
        let lo = self.options.word_gap_min.as_millis() as u64;
        let hi = (self.options.word_gap_max.as_millis() as u64).max(lo);
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

fn is_cancelled(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<RelayError>(), Some(RelayError::Cancelled))
}
