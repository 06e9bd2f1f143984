//! 名称变形工具: 表头规范化、单复数、类名推导

use convert_case::{Case, Casing};

/// 表头/操作符名规范化: 去空白、小写、空格与连字符转下划线
pub fn normalize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// 英文复数形式
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return word.to_string();
    }

    let lower = word.to_lowercase();

    if lower.ends_with('s')
        || lower.ends_with("sh")
        || lower.ends_with("ch")
        || lower.ends_with('x')
    {
        return format!("{}es", word);
    }

    if lower.ends_with('z') && !lower.ends_with("tz") {
        return format!("{}zes", word);
    }

    // 辅音 + y -> ies
    if let Some(stem) = word.strip_suffix(|c: char| c == 'y' || c == 'Y') {
        if ends_with_consonant(stem) {
            return format!("{}ies", stem);
        }
    }

    if lower.ends_with("fe") {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if lower.ends_with('f') && !lower.ends_with("ff") {
        return format!("{}ves", &word[..word.len() - 1]);
    }

    // 辅音 + o -> oes
    if let Some(stem) = word.strip_suffix(|c: char| c == 'o' || c == 'O') {
        if ends_with_consonant(stem) {
            return format!("{}es", word);
        }
    }

    format!("{}s", word)
}

/// 英文单数形式（pluralize 的近似逆运算）
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    let cut = |n: usize| word[..word.len() - n].to_string();

    if lower.ends_with("ies") && word.len() > 3 {
        return format!("{}y", cut(3));
    }
    if lower.ends_with("ves") && word.len() > 3 {
        return format!("{}f", cut(3));
    }
    if lower.ends_with("zzes") {
        return cut(3);
    }
    for suffix in ["sses", "shes", "ches", "xes", "oes"] {
        if lower.ends_with(suffix) {
            return cut(2);
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && word.len() > 1 {
        return cut(1);
    }
    word.to_string()
}

/// 由操作符名推导类名: `loader_releases` -> `LoaderRelease`
pub fn classify(operator: &str) -> String {
    singularize(&normalize(operator)).to_case(Case::Pascal)
}

fn ends_with_consonant(stem: &str) -> bool {
    stem.chars()
        .last()
        .map(|c| c.is_ascii_alphabetic() && !"aeiouAEIOU".contains(c))
        .unwrap_or(false)
}
