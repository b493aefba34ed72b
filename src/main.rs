use anyhow::{bail, Context, Result};
use ink_notebook::ink::container::{self, Container};
use ink_notebook::ink::{settings_store, InkEditor, RgbaBuffer};
use ink_notebook::logging;
use std::path::{Path, PathBuf};

const USAGE: &str = "usage:
  ink_notebook render <container-dir> <output-dir> [--settings <file>] [--debug]
  ink_notebook info <container-dir>";

const PAPER: [u8; 4] = [255, 255, 255, 255];

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|arg| arg == "--debug");
    let settings_path = args
        .iter()
        .position(|arg| arg == "--settings")
        .and_then(|idx| args.get(idx + 1))
        .map(PathBuf::from);
    let positional: Vec<&str> = positional_args(&args);

    let settings = match &settings_path {
        Some(path) => settings_store::load_from_path(path)?,
        None => settings_store::load()?,
    };
    logging::init(debug || settings.debug_logging);

    match positional.as_slice() {
        ["render", input, output] => render(settings, Path::new(input), Path::new(output)),
        ["info", input] => info(Path::new(input)),
        _ => bail!("{USAGE}"),
    }
}

fn positional_args(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        match arg.as_str() {
            "--settings" => skip_next = true,
            "--debug" => {}
            other => out.push(other),
        }
    }
    out
}

fn render(settings: ink_notebook::ink::InkSettings, input: &Path, output: &Path) -> Result<()> {
    let mut editor = InkEditor::new(settings);
    let report = editor.load_from_dir(input)?;
    for skipped in &report.skipped {
        tracing::warn!(error = %skipped, "record not imported");
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("create output folder {}", output.display()))?;
    let page_ids: Vec<u32> = editor.pages().map(|page| page.page_id).collect();
    for page_id in page_ids {
        editor.set_active_page(page_id)?;
        let size = editor.active_page().size();
        let mut ink = RgbaBuffer::new(size.width, size.height);
        editor
            .draw(&mut ink)
            .with_context(|| format!("draw page {page_id}"))?;
        let mut sheet = RgbaBuffer::filled(size.width, size.height, PAPER);
        sheet.draw_over(&ink, 0, 0);
        let path = output.join(format!("page-{page_id:04}.png"));
        sheet.save_png(&path)?;
        tracing::info!(page_id, path = %path.display(), "page rendered");
    }
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let archive = Container::read_from_dir(input)?;
    let report = container::import_pages(&archive)
        .with_context(|| format!("read notebook container {}", input.display()))?;
    if let Some(manifest) = &report.manifest {
        println!(
            "{} (format v{}): {} pages, {} strokes",
            manifest.created_by, manifest.version, manifest.page_count, manifest.total_strokes
        );
    }
    for page in &report.pages {
        println!(
            "Page {}: {}x{} {:?}, {} strokes",
            page.page_id,
            page.width,
            page.height,
            page.paper_style,
            page.stroke_count()
        );
    }
    for skipped in &report.skipped {
        println!("skipped: {skipped}");
    }
    Ok(())
}
