//! 文本分段器
//!
//! 将任意长度的输入文本切分为有界的文本块序列：
//! 1. 按空行切分段落
//! 2. 段落内按句末标点切分句子（带缩写/小数保护）
//! 3. 段落内贪心打包句子，直到再加一句会超过 `max_chunk_chars`
//!
//! 单句超过上限时整句独立成块（宁可超限，不截断丢字）。

use serde::Deserialize;

use super::chunk::TextChunk;

/// 默认最大块字符数
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 900;

/// 分段配置
///
/// 句界规则本身是启发式的，终止符集合保持可配置。
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    /// 单块最大字符数（贪心打包上限）
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// 句末终止符集合
    #[serde(default = "default_terminators")]
    pub terminators: Vec<char>,
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

fn default_terminators() -> Vec<char> {
    vec!['.', '!', '?', '。', '！', '？']
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            terminators: default_terminators(),
        }
    }
}

/// 对输入文本分段
///
/// 空白输入返回空序列（调用方须将其与"远程全部失败"区分开）。
/// 如果启发式切分一个块都没产出而输入非空，整段 trim 后作为单块返回。
pub fn segment(text: &str, config: &SegmentConfig) -> Vec<TextChunk> {
    let mut chunks: Vec<TextChunk> = Vec::new();

    for paragraph in split_paragraphs(text) {
        let sentences = split_sentences(&paragraph, config);
        for packed in pack_sentences(sentences, config.max_chunk_chars) {
            chunks.push(TextChunk::new(chunks.len(), packed));
        }
    }

    // 兜底：切分没有产出但输入确实有内容
    if chunks.is_empty() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(TextChunk::new(0, trimmed.to_string()));
        }
    }

    chunks
}

/// 按空行切分段落，段内换行折叠为空格
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(trimmed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

/// 段落内按句末标点切分句子
///
/// 句界条件：终止符（连续终止符合并）后跟空白，且空白后的首个字符
/// 开启新句（大写字母或无大小写文字）。
/// 保护规则：句点前的单个大写字母视为缩写（如 "J. Smith"），不切分；
/// 小数点后无空白，天然不满足句界条件。
fn split_sentences(paragraph: &str, config: &SegmentConfig) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    let mut sentences: Vec<String> = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !config.terminators.contains(&chars[i]) {
            i += 1;
            continue;
        }

        // 合并连续终止符（"?!"、"..."）
        let mut end = i;
        while end + 1 < chars.len() && config.terminators.contains(&chars[end + 1]) {
            end += 1;
        }

        if is_boundary(&chars, i, end) {
            let sentence: String = chars[start..=end].iter().collect();
            let trimmed = sentence.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            start = end + 1;
        }
        i = end + 1;
    }

    // 段落尾部（无终止符结尾的残句）
    if start < chars.len() {
        let rest: String = chars[start..].iter().collect();
        let trimmed = rest.trim();
        if !trimmed.is_empty() {
            sentences.push(trimmed.to_string());
        }
    }

    sentences
}

/// 判断终止符序列 `[first..=last]` 是否构成句界
fn is_boundary(chars: &[char], first: usize, last: usize) -> bool {
    // 全角终止符：CJK 文本句间无空格，终止符本身即句界
    if !chars[first].is_ascii() {
        return true;
    }

    // 后缀：必须先有空白，再有开启新句的字符
    let mut k = last + 1;
    if k >= chars.len() || !chars[k].is_whitespace() {
        return false;
    }
    while k < chars.len() && chars[k].is_whitespace() {
        k += 1;
    }
    let Some(&next) = chars.get(k) else {
        return false;
    };
    if !starts_new_sentence(next) {
        return false;
    }

    // 前缀：句点前的单个大写字母按缩写处理
    if chars[first] == '.' {
        let mut token_len = 0;
        let mut p = first;
        while p > 0 && chars[p - 1].is_alphanumeric() {
            token_len += 1;
            p -= 1;
        }
        if token_len == 1 && chars[first - 1].is_uppercase() {
            return false;
        }
    }

    true
}

/// 字符是否能开启新句：大写字母，或无大小写区分的文字（CJK 等）
fn starts_new_sentence(c: char) -> bool {
    c.is_uppercase() || (c.is_alphabetic() && !c.is_lowercase())
}

/// 贪心打包：相邻句子尽量装进同一块，超限则另起新块
///
/// 单句超过 `max_chars` 时独立成超限块，不在句中截断。
fn pack_sentences(sentences: Vec<String>, max_chars: usize) -> Vec<String> {
    let mut packed: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();

        if current.is_empty() {
            current = sentence;
            current_chars = sentence_chars;
            continue;
        }

        // +1 是句间的空格分隔符
        if current_chars + 1 + sentence_chars > max_chars {
            packed.push(std::mem::take(&mut current));
            current = sentence;
            current_chars = sentence_chars;
        } else {
            current.push(' ');
            current.push_str(&sentence);
            current_chars += 1 + sentence_chars;
        }
    }

    if !current.is_empty() {
        packed.push(current);
    }

    packed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max: usize) -> SegmentConfig {
        SegmentConfig {
            max_chunk_chars: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(segment("", &cfg(100)).is_empty());
        assert!(segment("   \n\n  \t ", &cfg(100)).is_empty());
    }

    #[test]
    fn test_single_sentence_single_chunk() {
        let chunks = segment("Hello world.", &cfg(100));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, "Hello world.");
        assert_eq!(chunks[0].length, 12);
    }

    #[test]
    fn test_greedy_packing_respects_limit() {
        let text = "One two three. Four five six. Seven.";
        let chunks = segment(text, &cfg(30));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "One two three. Four five six.");
        assert_eq!(chunks[1].content, "Seven.");
        assert!(chunks[0].length <= 30);
    }

    #[test]
    fn test_oversized_sentence_becomes_own_chunk() {
        // 单句 44 字符，上限 20：整句保留，不截断
        let text = "Short one. This single sentence is much too long to fit. End.";
        let chunks = segment(text, &cfg(20));

        assert!(chunks.iter().any(|c| c.length > 20));
        let joined: String = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, text);
    }

    #[test]
    fn test_abbreviation_not_split() {
        let chunks = segment("I met J. Smith today. He was well.", &cfg(25));
        assert_eq!(chunks[0].content, "I met J. Smith today.");
    }

    #[test]
    fn test_decimal_not_split() {
        let chunks = segment("Pi is 3.14 about. Next sentence here.", &cfg(20));
        assert_eq!(chunks[0].content, "Pi is 3.14 about.");
    }

    #[test]
    fn test_lowercase_after_period_not_split() {
        // "e.g. foo" 中句点后是小写，不构成句界
        let chunks = segment("Use tools e.g. hammers carefully.", &cfg(100));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_paragraphs_never_pack_together() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = segment(text, &cfg(200));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "First paragraph.");
        assert_eq!(chunks[1].content, "Second paragraph.");
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_paragraph_inner_newline_folded() {
        let text = "Line one continues\nhere. Done.";
        let chunks = segment(text, &cfg(100));
        assert_eq!(chunks[0].content, "Line one continues here. Done.");
    }

    #[test]
    fn test_no_terminator_fallback_single_chunk() {
        let chunks = segment("just some words without punctuation", &cfg(100));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "just some words without punctuation");
    }

    #[test]
    fn test_cjk_terminators_split() {
        let chunks = segment("第一句话。第二句话。", &cfg(6));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "第一句话。");
    }

    #[test]
    fn test_consecutive_terminators_stay_together() {
        let chunks = segment("Really?! Yes indeed. Fine.", &cfg(10));
        assert_eq!(chunks[0].content, "Really?!");
    }

    #[test]
    fn test_indices_are_sequential() {
        let text = "A one. B two. C three.\n\nD four. E five.";
        let chunks = segment(text, &cfg(8));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }
}
