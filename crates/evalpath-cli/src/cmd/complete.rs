//! `ep complete` / `ep skip`: resolve a screen.

use anyhow::{Context, Result};
use clap::Args;
use evalpath_core::CompletionPayload;
use serde_json::Value;

use super::state::render_state;
use super::{CommandContext, FlowArgs};
use crate::output::fail;

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Screen id to complete.
    pub screen: String,

    #[command(flatten)]
    pub flow: FlowArgs,

    /// Screen answer as JSON. For the selection screen,
    /// `{"selectedItems": [...]}` picks the items to evaluate.
    #[arg(long)]
    pub data: Option<String>,

    /// Record the screen as skipped rather than answered.
    #[arg(long)]
    pub skip: bool,
}

#[derive(Args, Debug)]
pub struct SkipArgs {
    /// Screen id to skip.
    pub screen: String,

    #[command(flatten)]
    pub flow: FlowArgs,
}

fn parse_data(raw: Option<&str>) -> Result<Value> {
    raw.map_or(Ok(Value::Null), |raw| {
        serde_json::from_str(raw).context("--data must be valid JSON")
    })
}

pub fn run_complete(args: &CompleteArgs, ctx: &CommandContext) -> Result<()> {
    let payload = CompletionPayload {
        data: parse_data(args.data.as_deref())?,
        was_skipped: args.skip.then_some(true),
    };
    let mut service = ctx.service()?;
    let flow = args.flow.flow();
    let state = service
        .complete_screen(&args.flow.user, &flow, &args.screen, payload)
        .map_err(|err| fail(ctx.output, &err))?;
    render_state(ctx.output, &args.flow.user, &flow, &state)
}

pub fn run_skip(args: &SkipArgs, ctx: &CommandContext) -> Result<()> {
    let mut service = ctx.service()?;
    let flow = args.flow.flow();
    let state = service
        .skip_screen(&args.flow.user, &flow, &args.screen)
        .map_err(|err| fail(ctx.output, &err))?;
    render_state(ctx.output, &args.flow.user, &flow, &state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: CompleteArgs,
    }

    #[test]
    fn parses_screen_flow_and_flags() {
        let w = Wrapper::parse_from([
            "test",
            "comparison_0",
            "--user",
            "ana",
            "--target",
            "org/app",
            "--skip",
        ]);
        assert_eq!(w.args.screen, "comparison_0");
        assert_eq!(w.args.flow.target.as_deref(), Some("org/app"));
        assert!(w.args.skip);
    }

    #[test]
    fn data_defaults_to_null_and_rejects_garbage() {
        assert_eq!(parse_data(None).expect("null"), Value::Null);
        assert_eq!(
            parse_data(Some(r#"{"selectedItems":["a"]}"#)).expect("json")["selectedItems"][0],
            "a"
        );
        assert!(parse_data(Some("{nope")).is_err());
    }
}
