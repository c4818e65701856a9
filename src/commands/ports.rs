use std::path::Path;

use color_print::cformat;
use wtport::ports::PortRegistry;
use wtport::styling::{eprintln, info_message, println};

use super::open_repository;

pub(crate) fn handle_ports(cwd: &Path) -> anyhow::Result<()> {
    let (handle, _) = open_repository(cwd)?;
    let assignments = PortRegistry::new(&handle.tool_dir()).list()?;
    if assignments.worktrees.is_empty() {
        eprintln!("{}", info_message("No ports reserved"));
        return Ok(());
    }
    for (worktree, ports) in &assignments.worktrees {
        let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
        println!("{}", cformat!("<bold>{worktree}</>  {}", ports.join(", ")));
    }
    Ok(())
}
