//! UI command - open the interactive dashboard.

use anyhow::Result;
use port_arranger_core::Registry;

use crate::tui;

pub async fn run(registry: Registry) -> Result<()> {
    if !atty::is(atty::Stream::Stdout) {
        anyhow::bail!("The dashboard needs an interactive terminal; use `pa list` instead");
    }
    tui::run(registry).await
}
