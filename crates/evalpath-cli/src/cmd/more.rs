//! `ep more`: append comparisons to an existing plan.

use anyhow::Result;
use clap::Args;

use super::state::render_state;
use super::{CommandContext, FlowArgs};
use crate::output::fail;

#[derive(Args, Debug)]
pub struct MoreArgs {
    #[command(flatten)]
    pub flow: FlowArgs,

    /// Comparisons to request. Defaults to `generator.comparisons_per_plan`.
    #[arg(long, short)]
    pub count: Option<usize>,
}

pub fn run_more(args: &MoreArgs, ctx: &CommandContext) -> Result<()> {
    let count = args
        .count
        .unwrap_or(ctx.config.project.generator.comparisons_per_plan);
    let mut service = ctx.service()?;
    let flow = args.flow.flow();
    let state = service
        .extend_comparisons(&args.flow.user, &flow, count)
        .map_err(|err| fail(ctx.output, &err))?;
    render_state(ctx.output, &args.flow.user, &flow, &state)
}
