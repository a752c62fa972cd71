//! `ep state`: show the derived navigation state of a flow.

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use evalpath_core::model::{NavStatus, NavigationState};
use evalpath_core::navigation::count_progress;
use evalpath_core::Flow;

use super::{CommandContext, FlowArgs};
use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct StateArgs {
    #[command(flatten)]
    pub flow: FlowArgs,
}

pub fn run_state(args: &StateArgs, ctx: &CommandContext) -> Result<()> {
    let service = ctx.service()?;
    let flow = args.flow.flow();
    let state = service
        .get_navigation_state(&args.flow.user, &flow)
        .map_err(|err| fail(ctx.output, &err))?;
    render_state(ctx.output, &args.flow.user, &flow, &state)
}

const fn marker(status: NavStatus) -> &'static str {
    match status {
        NavStatus::Current => ">",
        NavStatus::Completed => "✓",
        NavStatus::Skipped => "~",
        NavStatus::InProgress => "*",
        NavStatus::Pending => " ",
    }
}

/// Render a navigation state in any output mode.
pub fn render_state(
    mode: OutputMode,
    user: &str,
    flow: &Flow,
    state: &NavigationState,
) -> Result<()> {
    render_mode(mode, state, write_text, |state, w| {
        write_pretty(state, user, flow, w)
    })
}

fn write_text(state: &NavigationState, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "current\t{}", state.current_screen)?;
    if let Some(focused) = &state.focused_screen {
        writeln!(w, "focused\t{focused}")?;
    }
    for item in &state.navigation_items {
        writeln!(w, "{}\t{}\t{}", item.id, item.status, item.display_text)?;
    }
    Ok(())
}

fn write_pretty(
    state: &NavigationState,
    user: &str,
    flow: &Flow,
    w: &mut dyn Write,
) -> io::Result<()> {
    pretty_section(w, &format!("Flow {flow} for {user}"))?;
    let width = state
        .navigation_items
        .iter()
        .map(|item| item.id.len())
        .max()
        .unwrap_or(0);
    for item in &state.navigation_items {
        let focus = if state.focused_screen.as_deref() == Some(item.id.as_str()) {
            " (focused)"
        } else {
            ""
        };
        writeln!(
            w,
            "{} {:<width$}  {}{focus}",
            marker(item.status),
            item.id,
            item.display_text,
        )?;
    }
    writeln!(w)?;

    let (completed, skipped) = count_progress(state);
    let total = state.navigation_items.len().saturating_sub(1);
    pretty_kv(w, "Current", &state.current_screen)?;
    pretty_kv(
        w,
        "Progress",
        format!("{completed} completed, {skipped} skipped of {total}"),
    )
}
