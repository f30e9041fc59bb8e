use crate::plan::TreePlan;
use colored::Colorize;
use std::{
    collections::BTreeMap,
    fmt::Write,
    path::{Component, Path},
};

/// Represents a node in the tree (either file or directory).
#[derive(Debug, Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    is_file: bool,
}
impl TreeNode {
    fn insert(&mut self, path: &Path, is_file: bool) {
        let mut node = self;

        for component in path.components() {
            if let Component::Normal(name) = component {
                node = node
                    .children
                    .entry(name.to_string_lossy().into_owned())
                    .or_default();
            }
        }

        node.is_file = is_file;
    }
}

fn render_children(node: &TreeNode, prefix: &str, out: &mut String) {
    let len = node.children.len();

    for (i, (name, child)) in node.children.iter().enumerate() {
        let last = i + 1 == len;
        let connector = if last { "└── " } else { "├── " };
        let name = if child.is_file {
            name.green()
        } else {
            name.blue()
        };

        let _ = writeln!(out, "{}{}{}", prefix.yellow(), connector.yellow(), name);

        let child_prefix = if last {
            format!("{}    ", prefix)
        } else {
            format!("{}│   ", prefix)
        };

        render_children(child, &child_prefix, out);
    }
}

/// Renders `plan` as an ASCII tree rooted at `destination`.
pub fn render_tree(plan: &TreePlan, destination: &Path) -> String {
    let mut root = TreeNode::default();

    for entry in &plan.entries {
        root.insert(&entry.destination, entry.is_file);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", destination.display().to_string().blue());
    render_children(&root, "", &mut out);

    out
}

pub fn preview_as_tree(plan: &TreePlan, destination: &Path) {
    println!(
        "Legend: {} = (directory), {} = (file)",
        "blue".blue(),
        "green".green()
    );

    println!(
        "{} {}\n",
        "┌─".bold().bright_blue(),
        "Preview".bold().bright_blue(),
    );

    print!("{}", render_tree(plan, destination));

    println!(
        "\n{} {} {}",
        "└─".bold().bright_blue(),
        plan.file_destinations().len().to_string().bright_green(),
        "file(s) would be installed, nothing was written".bright_green()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlannedEntry;
    use std::path::PathBuf;

    fn entry(destination: &str, is_file: bool) -> PlannedEntry {
        PlannedEntry {
            source: PathBuf::from("unused"),
            destination: PathBuf::from(destination),
            is_file,
        }
    }

    #[test]
    fn test_render_tree() {
        colored::control::set_override(false);

        let plan = TreePlan {
            entries: vec![
                entry("01_intro.ipynb", true),
                entry("assets", false),
                entry("assets/overlay.bit", true),
                entry("assets/overlay.hwh", true),
            ],
        };

        let rendered = render_tree(&plan, Path::new("/home/xilinx/jupyter_notebooks/dsp_pynq"));

        assert_eq!(
            rendered,
            "/home/xilinx/jupyter_notebooks/dsp_pynq\n\
             ├── 01_intro.ipynb\n\
             └── assets\n    \
             ├── overlay.bit\n    \
             └── overlay.hwh\n"
        );
    }
}
