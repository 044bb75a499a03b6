use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use markup_core::{
    Annotation, AnnotationEditor, AnnotationKind, DocPoint, DocRect, EditorConfig, Rgb,
    SaveTarget,
};
use pdf_engine::{default_engine, LopdfEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MARKUP_LOG";

#[derive(Debug, Parser)]
#[command(name = "markup-cli")]
#[command(about = "Inspect and add PDF markup annotations")]
pub struct Cli {
    /// Log filter used when MARKUP_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the annotations of every page, or of one page.
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// 1-based page number.
        #[arg(long)]
        page: Option<usize>,
    },
    /// Add one annotation and save the document.
    Add {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        kind: AnnotationKind,
        /// Document-space rectangle `x0,y0,x1,y1` for box kinds.
        #[arg(long, value_parser = parse_rect, conflicts_with = "at")]
        rect: Option<DocRect>,
        /// Document-space anchor `x,y` for free text.
        #[arg(long, value_parser = parse_point)]
        at: Option<DocPoint>,
        #[arg(long, value_parser = parse_color)]
        color: Option<Rgb>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        font_size: Option<f32>,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, conflicts_with = "in_place", required_unless_present = "in_place")]
        output: Option<PathBuf>,
        /// Overwrite FILE instead of writing a new document.
        #[arg(long)]
        in_place: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: usize,
    first_page_size_pt: Option<PageSizeOutput>,
    annotation_count: usize,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct PageOutput<'a> {
    page: usize,
    annotations: &'a [Annotation],
}

#[derive(Debug, Serialize)]
struct ListOutput<'a> {
    path: String,
    pages: Vec<PageOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct AddOutput {
    output: String,
    page: usize,
    index: usize,
    annotations_written: usize,
}

struct AddRequest {
    kind: AnnotationKind,
    rect: Option<DocRect>,
    at: Option<DocPoint>,
    color: Option<Rgb>,
    text: Option<String>,
    font_size: Option<f32>,
    page: usize,
    target: SaveTarget,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::List { file, page } => run_list(&file, page),
        Commands::Add { file, kind, rect, at, color, text, font_size, page, output, in_place } => {
            let target = match output {
                Some(path) if !in_place => SaveTarget::NewFile(path),
                _ => SaveTarget::InPlace,
            };
            let request = AddRequest { kind, rect, at, color, text, font_size, page, target };
            run_add(&file, request)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_editor(file: &Path) -> Result<AnnotationEditor<LopdfEngine>> {
    ensure_pdf_exists(file)?;

    let config = EditorConfig::from_env().context("invalid MARKUP_* configuration")?;
    let mut editor = AnnotationEditor::new(default_engine(), config);
    let stats = editor.open(file).context("failed to open PDF")?;
    debug!(?stats, "imported annotations");

    Ok(editor)
}

fn run_info(file: &Path) -> Result<()> {
    let editor = open_editor(file)?;

    let first_page_size_pt = if editor.page_count() > 0 {
        let size = editor.current_page_size()?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: editor.page_count(),
        first_page_size_pt,
        annotation_count: editor.annotations().total(),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_list(file: &Path, page: Option<usize>) -> Result<()> {
    let editor = open_editor(file)?;
    let wanted = page.map(|page| page_index(page, editor.page_count())).transpose()?;

    let pages = editor
        .annotations()
        .iter()
        .filter(|(index, _)| wanted.map_or(true, |wanted| wanted == *index))
        .map(|(index, page)| PageOutput { page: index + 1, annotations: page.as_slice() })
        .collect();

    let payload = ListOutput { path: file.display().to_string(), pages };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_add(file: &Path, request: AddRequest) -> Result<()> {
    let mut editor = open_editor(file)?;
    let page = page_index(request.page, editor.page_count())?;

    let color = request.color.unwrap_or(editor.config().default_color);
    let annotation = match request.kind {
        AnnotationKind::FreeText => {
            let anchor = request.at.context("--at x,y is required for free_text")?;
            let text = request.text.filter(|text| !text.is_empty());
            let text = text.context("--text is required for free_text")?;
            let font_size = request.font_size.unwrap_or(editor.config().default_font_size);
            Annotation::free_text(anchor, font_size, color, text)?
        }
        kind => {
            let rect = request
                .rect
                .with_context(|| format!("--rect x0,y0,x1,y1 is required for {kind}"))?;
            let annotation = Annotation::boxed(kind, rect, color)?;
            match request.text {
                Some(comment) => annotation.with_text(comment),
                None => annotation,
            }
        }
    };

    let index = editor
        .add_annotation(page, annotation)?
        .context("page is outside the document")?;
    let (output, stats) = editor.save(request.target).context("failed to save PDF")?;

    let payload = AddOutput {
        output: output.display().to_string(),
        page: page + 1,
        index,
        annotations_written: stats.annotations_written,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn page_index(page: usize, page_count: usize) -> Result<usize> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if page > page_count {
        anyhow::bail!("--page {page} is out of range; the document has {page_count} pages");
    }
    Ok(page - 1)
}

fn parse_floats<const N: usize>(value: &str) -> Result<[f32; N], String> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|part| part.trim().parse::<f32>().map_err(|err| format!("{part:?}: {err}")))
        .collect::<Result<_, _>>()?;

    parts.try_into().map_err(|parts: Vec<f32>| format!("expected {N} numbers, got {}", parts.len()))
}

fn parse_rect(value: &str) -> Result<DocRect, String> {
    let [x0, y0, x1, y1] = parse_floats::<4>(value)?;
    DocRect::new(x0, y0, x1, y1).map_err(|err| err.to_string())
}

fn parse_point(value: &str) -> Result<DocPoint, String> {
    let [x, y] = parse_floats::<2>(value)?;
    let point = DocPoint::new(x, y);
    if !point.is_finite() {
        return Err("coordinates must be finite".to_string());
    }
    Ok(point)
}

fn parse_color(value: &str) -> Result<Rgb, String> {
    Rgb::from_hex(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rect_and_normalizes() {
        let rect = parse_rect("100, 40, 10,10").expect("valid rect");
        assert_eq!(rect.to_array(), [10.0, 10.0, 100.0, 40.0]);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_point("1,2,3").is_err());
        assert!(parse_rect("1,2,x,4").is_err());
    }

    #[test]
    fn page_numbers_are_one_based() {
        assert_eq!(page_index(1, 3).expect("in range"), 0);
        assert!(page_index(0, 3).is_err());
        assert!(page_index(4, 3).is_err());
    }

    #[test]
    fn cli_requires_an_output_for_add() {
        let parsed = Cli::try_parse_from([
            "markup-cli",
            "add",
            "doc.pdf",
            "--kind",
            "highlight",
            "--rect",
            "0,0,1,1",
        ]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "markup-cli",
            "add",
            "doc.pdf",
            "--kind",
            "highlight",
            "--rect",
            "0,0,1,1",
            "--in-place",
        ]);
        assert!(parsed.is_ok());
    }
}
