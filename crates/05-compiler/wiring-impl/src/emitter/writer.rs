//! 带缩进的源码缓冲区

const INDENT: &str = "    ";

/// 源码写入器
#[derive(Debug, Default)]
pub(crate) struct SourceWriter {
    buffer: String,
    depth: usize,
}

impl SourceWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 写入一行
    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buffer.push_str(INDENT);
            }
            self.buffer.push_str(text);
        }
        self.buffer.push('\n');
    }

    /// 写入一行并增加缩进
    pub(crate) fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// 减少缩进并写入一行
    pub(crate) fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// 空行
    pub(crate) fn blank(&mut self) {
        self.buffer.push('\n');
    }

    pub(crate) fn finish(self) -> String {
        self.buffer
    }
}
