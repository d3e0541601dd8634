use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::ai::ConversationEntry;
use crate::imaging::GeneratedImage;

/// Render entries as `"<label>: <text>"` lines, one per entry.
pub fn render_transcript(entries: &[ConversationEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}\n", e.role.label(), e.text))
        .collect()
}

/// Write a conversation transcript to `path` (UTF-8, overwriting).
pub fn export_conversation(entries: &[ConversationEntry], path: &Path) -> io::Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    out.write_all(render_transcript(entries).as_bytes())?;
    out.flush()?;
    log::info!("Exported {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Write the decoded image bytes to `path` as-is.
pub fn save_image(image: &GeneratedImage, path: &Path) -> io::Result<()> {
    fs::write(path, &image.bytes)?;
    log::info!("Saved image ({} bytes) to {}", image.bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Role;

    #[test]
    fn transcript_uses_role_labels() {
        let entries = vec![
            ConversationEntry::new(Role::User, "hello"),
            ConversationEntry::new(Role::Assistant, "hi!"),
        ];
        assert_eq!(render_transcript(&entries), "You: hello\nAI: hi!\n");
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        let entries = vec![ConversationEntry::new(Role::User, "привет")];
        export_conversation(&entries, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "You: привет\n");
    }

    #[test]
    fn empty_conversation_exports_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        export_conversation(&[], &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn save_image_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let image = GeneratedImage {
            bytes: vec![0x89, b'P', b'N', b'G', 0, 1, 2],
            format: None,
            dimensions: None,
        };
        save_image(&image, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), image.bytes);
    }
}
