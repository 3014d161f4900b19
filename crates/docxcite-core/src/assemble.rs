/*
 * assemble.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Writes rewritten markup parts back into an archive and exports it.
 */

use tracing::{debug, info};

use crate::archive::Archive;
use crate::document::MarkupPart;
use crate::error::{Error, Result};
use crate::progress::ProgressSink;

/// Replace every modified part in `archive` and export it.
///
/// All parts are serialized before the archive is touched, so a
/// serialization failure leaves the archive as it was. Replacing a part with
/// identical text is harmless, which lets a failed export be retried.
pub async fn assemble(
    archive: &mut dyn Archive,
    parts: &[MarkupPart],
    progress: &dyn ProgressSink,
) -> Result<Vec<u8>> {
    let mut serialized = Vec::new();
    for part in parts.iter().filter(|p| p.modified) {
        let text = part.doc.to_xml_string().map_err(|source| Error::Xml {
            part: part.path.clone(),
            source,
        })?;
        serialized.push((part.path.as_str(), text));
    }

    for (path, text) in serialized {
        archive.remove(path);
        archive.add_text(path, text);
        debug!(part = path, "Replaced archive entry");
    }

    progress.emit("zipping ...");
    let bytes = archive.export(progress).await?;
    progress.emit("Got blob");
    info!(bytes = bytes.len(), "Exported document");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::progress::NoopProgress;

    fn part(path: &str, xml: &str, modified: bool) -> MarkupPart {
        MarkupPart {
            path: path.to_string(),
            doc: docxcite_xml::parse(xml).unwrap(),
            modified,
        }
    }

    #[tokio::test]
    async fn test_only_modified_parts_are_replaced() {
        let mut archive = MemoryArchive::from_entries([
            ("word/document.xml", "<doc>old</doc>"),
            ("word/footnotes.xml", "<notes>  keep  </notes>"),
            ("word/styles.xml", "<styles/>"),
        ]);
        let mut document = part("word/document.xml", "<doc>old</doc>", true);
        let root = document.doc.root();
        document.doc.set_text_content(root, "new");
        let parts = vec![document, part("word/footnotes.xml", "<notes/>", false)];

        let bytes = assemble(&mut archive, &parts, &NoopProgress).await.unwrap();

        assert_eq!(
            MemoryArchive::decode(&bytes).unwrap(),
            vec![
                ("word/footnotes.xml".to_string(), "<notes>  keep  </notes>".to_string()),
                ("word/styles.xml".to_string(), "<styles/>".to_string()),
                ("word/document.xml".to_string(), "<doc>new</doc>".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_export_can_be_retried() {
        let mut archive = MemoryArchive::from_entries([("word/document.xml", "<doc/>")]);
        let parts = vec![part("word/document.xml", "<doc>x</doc>", true)];
        archive.fail_next_exports(1);

        let first = assemble(&mut archive, &parts, &NoopProgress).await;
        assert!(matches!(first, Err(Error::Export(_))));

        let bytes = assemble(&mut archive, &parts, &NoopProgress).await.unwrap();
        assert_eq!(
            MemoryArchive::decode(&bytes).unwrap(),
            vec![("word/document.xml".to_string(), "<doc>x</doc>".to_string())]
        );
    }
}
