use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};

use modguard_core_types::{Inventory, ReportedHash};
use modguard_hasher::{discover, scan, ContentHasher};

#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct HashCmd {
    /// Directory holding the modules to hash
    pub dir: PathBuf,
}

impl HashCmd {
    pub fn run(&self) -> Result<()> {
        for line in render(&hash_dir(&self.dir)?) {
            println!("{line}");
        }

        Ok(())
    }
}

/// Hash every module found in `dir`.
pub fn hash_dir(dir: &std::path::Path) -> Result<Inventory> {
    let modules =
        discover(dir).wrap_err_with(|| format!("Failed to list modules in {}", dir.display()))?;

    Ok(scan(&ContentHasher::default(), modules))
}

/// Render an inventory as allowlist lines.
pub fn render(inventory: &Inventory) -> Vec<String> {
    inventory
        .iter()
        .map(|(id, hash)| match hash {
            ReportedHash::Known(digest) => modguard_allowlist::render_entry(id, digest),
            ReportedHash::Unverifiable => format!("{id}:{hash}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jei.jar"), b"jei").unwrap();
        std::fs::write(dir.path().join("create.jar"), b"create").unwrap();

        let lines = render(&hash_dir(dir.path()).unwrap());

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("create:"));
        assert!(lines[1].starts_with("jei:"));
        assert!(lines.iter().all(|l| modguard_allowlist::parse_entry(l).is_ok()));
    }
}
