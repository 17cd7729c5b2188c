use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "reducer")]
#[command(about = "Run a prompt over a long context file, one token-bounded slice at a time")]
pub struct Args {
    /// Text file holding the context to reduce
    #[arg(long)]
    pub context_file: PathBuf,
    /// Prompt text, or a path to it with --is-prompt-file
    #[arg(long)]
    pub prompt: String,
    /// Read the prompt from the file named by --prompt
    #[arg(long)]
    pub is_prompt_file: bool,
    /// Model to use (overrides [app] model in the config file)
    #[arg(long)]
    pub model: Option<String>,
    /// Where to write the JSON responses (default: <context name>_reduced.json)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn read_context(&self) -> Result<String> {
        read_text(&self.context_file, "context file")
    }

    pub fn read_prompt(&self) -> Result<String> {
        if self.is_prompt_file {
            read_text(Path::new(&self.prompt), "prompt file")
        } else {
            Ok(self.prompt.clone())
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| reduced_output_path(&self.context_file))
    }
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {what} {}", path.display()))
}

/// `dir/notes.v2.txt` becomes `dir/notes_reduced.json`.
pub fn reduced_output_path(context_file: &Path) -> PathBuf {
    let name = context_file
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let stem = match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem,
        _ => name.trim_start_matches('.'),
    };
    context_file.with_file_name(format!("{stem}_reduced.json"))
}
