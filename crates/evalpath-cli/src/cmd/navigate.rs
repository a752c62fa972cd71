//! `ep navigate`: move focus to a reachable screen.

use anyhow::Result;
use clap::Args;

use super::state::render_state;
use super::{CommandContext, FlowArgs};
use crate::output::fail;

#[derive(Args, Debug)]
pub struct NavigateArgs {
    /// Screen id to focus.
    pub screen: String,

    #[command(flatten)]
    pub flow: FlowArgs,
}

pub fn run_navigate(args: &NavigateArgs, ctx: &CommandContext) -> Result<()> {
    let service = ctx.service()?;
    let flow = args.flow.flow();
    let state = service
        .navigate_to(&args.flow.user, &flow, &args.screen)
        .map_err(|err| fail(ctx.output, &err))?;
    render_state(ctx.output, &args.flow.user, &flow, &state)
}
