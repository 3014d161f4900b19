//! Process command - finalize citations in .docx files

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use docxcite_core::{
    AuthorDateFactory, DocumentInput, ProgressSink, SyncConfig, Synchronizer, TracingProgress,
    ZipContainer, ZoteroClient,
};

use crate::settings::Settings;

/// Arguments for the process command.
pub struct ProcessArgs {
    pub settings_path: PathBuf,
    pub files: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub bibliography: Option<PathBuf>,
    pub locales: Option<PathBuf>,
}

/// Execute the process command.
pub fn execute(args: ProcessArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_process(args))
}

async fn run_process(args: ProcessArgs) -> Result<()> {
    let settings = Settings::load_or_default(&args.settings_path)?;
    let config = SyncConfig::default();
    let progress: Arc<dyn ProgressSink> = Arc::new(TracingProgress);

    let factory = match &settings.style {
        Some(location) => {
            let csl = super::load_style(location).await?;
            let factory = AuthorDateFactory::from_csl(&csl)
                .with_context(|| format!("Cannot use style {}", location))?;
            info!(style = %location, "Loaded citation style");
            factory
        }
        None => {
            warn!("No CSL file configured; using the built-in author-date style");
            AuthorDateFactory::default()
        }
    };

    let locales = match &args.locales {
        Some(dir) => read_locales(dir, &config.locales)?,
        None => HashMap::new(),
    };

    progress.emit("loading docx files ...");
    let mut inputs = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let archive = ZipContainer::open(bytes)
            .await
            .with_context(|| format!("{} is not a .docx file", path.display()))?;
        inputs.push(DocumentInput::new(file_name(path), archive));
    }

    let synchronizer = Synchronizer::new(
        Arc::new(ZoteroClient::new().with_page_size(config.page_size())),
        Arc::new(factory),
    )
    .with_config(config)
    .with_locales(locales)
    .with_progress(progress.clone());

    let output = synchronizer.run(&settings.credentials(), inputs).await?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let mut failures = 0;
    for outcome in &output.documents {
        for warning in &outcome.warnings {
            eprintln!("{}: warning: {}", outcome.name, warning);
        }
        let handle = match &outcome.result {
            Ok(handle) => handle,
            Err(err) => {
                error!(document = %outcome.name, error = %err, "Document failed");
                eprintln!("{}: error: {}", outcome.name, err);
                failures += 1;
                continue;
            }
        };

        match handle.generate(progress.as_ref()).await {
            Ok(blob) => {
                let target = args.out_dir.join(&outcome.name);
                std::fs::write(&target, &blob.bytes)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                println!("{} -> {}", outcome.name, target.display());
            }
            Err(err) => {
                eprintln!("{}: error: {}", outcome.name, err);
                failures += 1;
            }
        }
    }

    if let Some(path) = &args.bibliography {
        std::fs::write(path, &output.bibliography)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("bibliography -> {}", path.display());
    }

    if failures > 0 {
        bail!("{} of {} documents failed", failures, output.documents.len());
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.docx".to_string())
}

/// Read `locales-<lang>.xml` for every language that has a file in `dir`.
fn read_locales(dir: &Path, languages: &[String]) -> Result<HashMap<String, String>> {
    let mut locales = HashMap::new();
    for lang in languages {
        let path = dir.join(format!("locales-{}.xml", lang));
        if !path.exists() {
            warn!(path = %path.display(), "Locale file not found");
            continue;
        }
        let xml = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        locales.insert(lang.clone(), xml);
    }
    Ok(locales)
}
