//! [`WizardPage`] over a live browser tab.
//!
//! Each operation is a self-contained script. Choice controls are found by
//! their field label first; the form's generated listbox ids are only a
//! fallback because they shift between releases.

use super::page::{ChoiceControl, FormField, Step2Landmarks, WizardPage};
use crate::renderer::RenderContext;
use crate::script::{self, js_str};
use anyhow::{Context, Result};
use async_trait::async_trait;
use model_relay::TriggerGroups;
use serde_json::Value;

/// Name shared by every trigger-group input.
const TRIGGER_INPUT_SELECTOR: &str = r#"input[name="trigger_word_groups"]"#;

/// Helpers shared by every script: text normalization, native value
/// setting that the form's framework observes, control and option lookup.
const PRELUDE: &str = r#"
const relayNorm = (s) => (s || '').replace(/\u00A0/g, ' ').replace(/\s+/g, ' ').trim().toLowerCase();
const relaySetValue = (el, value) => {
    const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
};
const relayControl = (label, fallback) => {
    for (const l of document.querySelectorAll('label')) {
        if (relayNorm(l.textContent).replace(/\*/g, '').trim() !== label) continue;
        if (l.htmlFor) {
            const el = document.getElementById(l.htmlFor);
            if (el) return el;
        }
        let scope = l.parentElement;
        for (let depth = 0; scope && depth < 3; depth++, scope = scope.parentElement) {
            const btn = scope.querySelector('button[id^="headlessui-listbox-button"]');
            if (btn) return btn;
        }
    }
    return document.querySelector(fallback);
};
const relayOptions = () => {
    const scoped = Array.from(document.querySelectorAll('[role="listbox"] [role="option"]'));
    return scoped.length ? scoped : Array.from(document.querySelectorAll('li, button'));
};
const relayAddGroup = () => Array.from(document.querySelectorAll('button, a, [role="button"]'))
    .find((el) => relayNorm(el.textContent).includes('trigger group'));
"#;

fn field_selector(field: FormField) -> &'static str {
    match field {
        FormField::DisplayName => "#display_name",
        FormField::Description => "#description",
        FormField::VersionName => "#name",
    }
}

/// Versioned listbox id of a control, used when label lookup fails.
fn control_fallback(control: ChoiceControl) -> &'static str {
    match control {
        ChoiceControl::ModelType => r#"button[id^="headlessui-listbox-button"][id*=":r8:"]"#,
        ChoiceControl::Category => r#"button[id^="headlessui-listbox-button"][id*=":ra:"]"#,
        ChoiceControl::BaseModel => r#"button[id^="headlessui-listbox-button"][id*=":rq:"]"#,
    }
}

fn wrap(body: &str) -> String {
    format!("(() => {{\n{PRELUDE}\n{body}\n}})()")
}

fn control_expr(control: ChoiceControl) -> String {
    format!(
        "relayControl({}, {})",
        js_str(control.label()),
        js_str(control_fallback(control))
    )
}

pub fn set_field_script(field: FormField, value: &str) -> String {
    wrap(&format!(
        "const el = document.querySelector({sel});\n\
         if (!el) return false;\n\
         el.focus();\n\
         relaySetValue(el, {value});\n\
         return true;",
        sel = js_str(field_selector(field)),
        value = js_str(value),
    ))
}

pub fn open_choices_script(control: ChoiceControl) -> String {
    wrap(&format!(
        "const btn = {control};\n\
         if (!btn) return false;\n\
         btn.click();\n\
         return true;",
        control = control_expr(control),
    ))
}

pub fn choice_labels_script() -> String {
    wrap("return relayOptions().map((o) => (o.textContent || '').trim());")
}

pub fn pick_choice_script(index: usize) -> String {
    wrap(&format!(
        "const opt = relayOptions()[{index}];\n\
         if (!opt) return false;\n\
         opt.click();\n\
         return true;"
    ))
}

pub fn close_choices_script() -> String {
    wrap(
        "const target = document.activeElement || document.body;\n\
         target.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', bubbles: true }));\n\
         return true;",
    )
}

pub fn advance_script() -> String {
    wrap(
        "const next = Array.from(document.querySelectorAll('button'))\n\
             .find((b) => relayNorm(b.textContent) === 'next');\n\
         if (!next) return false;\n\
         next.click();\n\
         return true;",
    )
}

pub fn landmarks_script() -> String {
    wrap(&format!(
        "return {{\n\
             version: !!document.querySelector({version}),\n\
             base: !!{base},\n\
             add: !!relayAddGroup(),\n\
         }};",
        version = js_str(field_selector(FormField::VersionName)),
        base = control_expr(ChoiceControl::BaseModel),
    ))
}

pub fn add_group_script() -> String {
    wrap(
        "const add = relayAddGroup();\n\
         if (!add) return false;\n\
         add.click();\n\
         return true;",
    )
}

pub fn trigger_count_script() -> String {
    wrap(&format!(
        "return document.querySelectorAll({}).length;",
        js_str(TRIGGER_INPUT_SELECTOR)
    ))
}

/// Append one word to a trigger input, then press comma so the form's
/// tokenizer commits it.
pub fn commit_word_script(input_index: usize, word: &str) -> String {
    wrap(&format!(
        "const el = document.querySelectorAll({sel})[{input_index}];\n\
         if (!el) return false;\n\
         el.focus();\n\
         const word = {word};\n\
         relaySetValue(el, el.value ? el.value + ', ' + word : word);\n\
         for (const type of ['keydown', 'keyup']) {{\n\
             el.dispatchEvent(new KeyboardEvent(type, {{ key: ',', code: 'Comma', bubbles: true }}));\n\
         }}\n\
         return true;",
        sel = js_str(TRIGGER_INPUT_SELECTOR),
        word = js_str(word),
    ))
}

/// A wizard page backed by a render context.
pub struct BrowserWizard<'a> {
    ctx: &'a dyn RenderContext,
}

impl<'a> BrowserWizard<'a> {
    pub fn new(ctx: &'a dyn RenderContext) -> Self {
        Self { ctx }
    }

    async fn run(&self, script: &str) -> Result<Value> {
        self.ctx.execute_js(script).await
    }

    async fn run_bool(&self, script: &str) -> Result<bool> {
        Ok(self.run(script).await?.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl WizardPage for BrowserWizard<'_> {
    async fn set_field(&self, field: FormField, value: &str) -> Result<bool> {
        self.run_bool(&set_field_script(field, value)).await
    }

    async fn open_choices(&self, control: ChoiceControl) -> Result<bool> {
        self.run_bool(&open_choices_script(control)).await
    }

    async fn choice_labels(&self) -> Result<Vec<String>> {
        let value = self.run(&choice_labels_script()).await?;
        serde_json::from_value(value).context("option list has an unexpected shape")
    }

    async fn pick_choice(&self, index: usize) -> Result<bool> {
        self.run_bool(&pick_choice_script(index)).await
    }

    async fn close_choices(&self) -> Result<()> {
        self.run(&close_choices_script()).await?;
        Ok(())
    }

    async fn advance(&self) -> Result<bool> {
        self.run_bool(&advance_script()).await
    }

    async fn step2_landmarks(&self) -> Result<Step2Landmarks> {
        let value = self.run(&landmarks_script()).await?;
        let flag = |key: &str| value.get(key).and_then(Value::as_bool).unwrap_or(false);
        Ok(Step2Landmarks {
            version_field: flag("version"),
            base_model_control: flag("base"),
            add_group_control: flag("add"),
        })
    }

    async fn add_trigger_group(&self) -> Result<bool> {
        self.run_bool(&add_group_script()).await
    }

    async fn trigger_input_count(&self) -> Result<usize> {
        let value = self.run(&trigger_count_script()).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn commit_word(&self, input_index: usize, word: &str) -> Result<bool> {
        self.run_bool(&commit_word_script(input_index, word)).await
    }

    async fn show_overlay(&self, groups: &TriggerGroups) -> Result<()> {
        self.run(&script::overlay_render_script(groups)).await?;
        Ok(())
    }

    async fn mark_group(&self, index: usize, ok: bool, reason: Option<&str>) -> Result<()> {
        self.run(&script::overlay_row_script(index, ok, reason))
            .await?;
        Ok(())
    }

    async fn set_overlay_status(&self, text: &str) -> Result<()> {
        self.run(&script::overlay_status_script(text)).await?;
        Ok(())
    }

    async fn fade_overlay(&self, delay_ms: u64) -> Result<()> {
        self.run(&script::overlay_fade_script(delay_ms)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_is_quoted() {
        let js = set_field_script(FormField::DisplayName, "Cat's </script>");
        assert!(js.contains("'#display_name'"));
        assert!(js.contains("'Cat\\'s \\x3c/script\\x3e'"));
    }

    #[test]
    fn test_control_resolves_label_then_versioned_id() {
        let js = open_choices_script(ChoiceControl::BaseModel);
        assert!(js.contains("relayControl('base model', "));
        assert!(js.contains(":rq:"));
    }

    #[test]
    fn test_commit_word_targets_index_and_presses_comma() {
        let js = commit_word_script(3, "red hair");
        assert!(js.contains("[3]"));
        assert!(js.contains("'red hair'"));
        assert!(js.contains("key: ','"));
    }

    #[test]
    fn test_landmarks_probe_all_three() {
        let js = landmarks_script();
        assert!(js.contains("version:"));
        assert!(js.contains("base:"));
        assert!(js.contains("add: !!relayAddGroup()"));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium
    async fn test_fill_fixture_wizard() {
        use crate::injection::{InjectOptions, Injector};
        use crate::renderer::chromium::ChromiumRenderer;
        use crate::renderer::Renderer;
        use model_relay::ModelRecord;
        use tokio_util::sync::CancellationToken;

        let html = r#"<html><body>
            <input id="display_name"><textarea id="description"></textarea>
            <button onclick="document.getElementById('s2').hidden=false">Next</button>
            <div id="s2" hidden>
                <input id="name">
                <label>Base Model</label><button id="headlessui-listbox-button-:rq:">Pick</button>
                <button onclick="for(let i=0;i<2;i++){const e=document.createElement('input');e.name='trigger_word_groups';this.before(e);}">+ Trigger Group</button>
            </div>
        </body></html>"#;

        let renderer = ChromiumRenderer::launch(false).await.unwrap();
        let mut ctx = renderer.new_context().await.unwrap();
        ctx.navigate("about:blank", 10_000).await.unwrap();
        ctx.execute_js(&format!(
            "document.open(); document.write({}); document.close(); true",
            js_str(html)
        ))
        .await
        .unwrap();

        let page = BrowserWizard::new(ctx.as_ref());
        let record = ModelRecord {
            title: "Cat Ears".into(),
            trigger_groups: vec![vec!["red hair".into(), "blue eyes".into()]],
            ..ModelRecord::default()
        };
        let report = Injector::new(InjectOptions::default())
            .fill(&page, &record, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.groups_succeeded(), 1);

        ctx.close().await.unwrap();
        renderer.shutdown().await.unwrap();
    }
}
