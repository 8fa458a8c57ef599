//! 文本块值对象
//!
//! 分段器的输出单元，同时也是远程合成调用的派发单元

/// 一个有界的连续文本片段
///
/// `index` 决定播放顺序；一经产生不可变更。
/// `length` 以字符计（非字节），用于进度统计。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// 在整段输入中的序号（从 0 开始）
    pub index: usize,
    /// 片段内容
    pub content: String,
    /// 字符数
    pub length: usize,
}

impl TextChunk {
    pub fn new(index: usize, content: String) -> Self {
        let length = content.chars().count();
        Self {
            index,
            content,
            length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let chunk = TextChunk::new(0, "第一章。".to_string());
        assert_eq!(chunk.length, 4);
        assert!(chunk.content.len() > 4);
    }
}
