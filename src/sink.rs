use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static ILLEGAL_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));

static REPEATED_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
#[error("create output file {}: {source}", path.display())]
pub struct SinkCreationError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCounts {
    pub units: usize,
    pub pages: usize,
    pub errors: usize,
}

/// Append-only text output of one traversal. Every record is flushed as soon
/// as it is written so an interrupted run keeps everything extracted so far.
pub struct TextSink<W: Write> {
    writer: W,
    counts: SinkCounts,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            counts: SinkCounts::default(),
        }
    }

    pub fn write_unit(&mut self, title: &str, content: &str) -> io::Result<()> {
        self.append(&format!("{title}\n\n{content}\n\n"))?;
        self.counts.units += 1;
        self.counts.pages += 1;
        Ok(())
    }

    pub fn write_continuation(&mut self, content: &str) -> io::Result<()> {
        self.append(&format!("{content}\n\n"))?;
        self.counts.pages += 1;
        Ok(())
    }

    pub fn write_error(&mut self, description: &str, url: &str) -> io::Result<()> {
        self.append(&format!("【错误】{description} (URL: {url})\n\n"))?;
        self.counts.errors += 1;
        Ok(())
    }

    pub fn counts(&self) -> SinkCounts {
        self.counts
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn append(&mut self, record: &str) -> io::Result<()> {
        self.writer.write_all(record.as_bytes())?;
        self.writer.flush()
    }
}

pub fn sanitize_file_name(name: &str) -> String {
    let replaced = ILLEGAL_FILE_CHARS.replace_all(name.trim(), "_");
    let collapsed = REPEATED_SEPARATORS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        "untitled".to_owned()
    } else {
        trimmed.to_owned()
    }
}

pub fn output_path(out_dir: &Path, document_title: &str) -> PathBuf {
    out_dir.join(format!("{}.txt", sanitize_file_name(document_title)))
}

/// Creates the output file for a document, refusing to overwrite an
/// existing one.
pub fn create_file_sink(path: &Path) -> Result<TextSink<BufWriter<File>>, SinkCreationError> {
    let to_error = |source| SinkCreationError {
        path: path.to_owned(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(to_error)?;
    }
    let file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .map_err(to_error)?;
    Ok(TextSink::new(BufWriter::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_use_the_documented_layout() -> io::Result<()> {
        let mut sink = TextSink::new(Vec::new());
        sink.write_unit("第1章", "正文一")?;
        sink.write_continuation("正文二")?;
        sink.write_error("获取章节内容失败: 第2章", "https://example.com/2")?;

        assert_eq!(
            sink.counts(),
            SinkCounts {
                units: 1,
                pages: 2,
                errors: 1
            }
        );
        let text = String::from_utf8(sink.into_inner()).map_err(io::Error::other)?;
        assert_eq!(
            text,
            "第1章\n\n正文一\n\n正文二\n\n【错误】获取章节内容失败: 第2章 (URL: https://example.com/2)\n\n"
        );
        Ok(())
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_file_name("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_file_name("//斗破苍穹:: 最新章节//"), "斗破苍穹_ 最新章节");
        assert_eq!(sanitize_file_name("__x__"), "x");
        assert_eq!(sanitize_file_name("???"), "untitled");
    }

    #[test]
    fn file_sink_refuses_to_overwrite() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = output_path(dir.path(), "书名");

        let mut sink = create_file_sink(&path)?;
        sink.write_unit("第1章", "正文")?;
        drop(sink);

        assert_eq!(std::fs::read_to_string(&path)?, "第1章\n\n正文\n\n");
        assert!(create_file_sink(&path).is_err());
        Ok(())
    }
}
