//! Lightweight keyword extraction for mixed Chinese/English text.

use std::collections::HashMap;

pub const STOPWORDS: &[&str] = &[
    "的", "了", "和", "是", "在", "有", "与", "这", "那", "个", "们", "中", "to", "the", "and", "in",
    "of", "a", "for", "我", "你", "他", "她", "它", "我们", "你们", "他们", "她们", "它们", "自己",
    "什么", "哪些", "怎么", "怎样", "如何", "因为", "所以", "但是", "可是", "然而", "而且", "并且",
    "或者", "如果", "虽然", "就是", "只是", "还是", "也是", "不是", "没有", "可以", "应该", "需要",
    "一个", "一种", "一些", "这个", "这些", "那个", "那些", "以及",
];

/// Subject areas and the search terms that identify them.
pub const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("生物", &["biology", "biological", "生物", "自然", "nature"]),
    ("植物", &["plant", "botanical", "plants", "flora", "植物"]),
    ("动物", &["animal", "wildlife", "fauna", "动物"]),
    ("细胞", &["cell", "cellular", "microscopic", "细胞", "微观"]),
    ("物理", &["physics", "physical", "物理", "力学"]),
    ("化学", &["chemistry", "chemical", "化学", "分子"]),
    ("数学", &["mathematics", "math", "数学", "公式"]),
    ("历史", &["history", "historical", "历史", "古代"]),
    ("地理", &["geography", "geographical", "地理", "地图"]),
    ("艺术", &["art", "artistic", "艺术", "美术"]),
    ("科技", &["technology", "tech", "科技", "创新"]),
    ("医学", &["medicine", "medical", "医学", "健康"]),
    ("教育", &["education", "educational", "教育", "学习"]),
    ("环境", &["environment", "environmental", "环境", "生态"]),
    ("经济", &["economy", "economic", "经济", "金融"]),
];

const TRANSLATIONS: &[(&str, &str)] = &[
    ("细胞", "cell"),
    ("植物", "plant"),
    ("动物", "animal"),
    ("生物", "biology"),
    ("物理", "physics"),
    ("化学", "chemistry"),
    ("数学", "mathematics"),
    ("历史", "history"),
    ("地理", "geography"),
    ("艺术", "art"),
    ("科技", "technology"),
    ("医学", "medicine"),
    ("教育", "education"),
    ("环境", "environment"),
    ("经济", "economy"),
    ("结构", "structure"),
    ("功能", "function"),
    ("特点", "characteristics"),
    ("分类", "classification"),
    ("过程", "process"),
    ("系统", "system"),
    ("机制", "mechanism"),
    ("原理", "principle"),
    ("组成", "composition"),
    ("层次", "hierarchy"),
];

const PUNCTUATION: &str = "，。！？；：“”‘’（）【】《》、…—·,.!?;:()[]<>\"'/\\";

/// Splits on punctuation and whitespace; every non-ASCII character stands
/// alone while ASCII runs accumulate into words.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() || PUNCTUATION.contains(ch) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else if !ch.is_ascii() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(ch.to_string());
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Most frequent meaningful tokens, ties broken by first occurrence.
pub fn extract_keywords(text: &str, top_k: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (pos, token) in tokenize(text).into_iter().enumerate() {
        let token = token.to_lowercase();
        if token.chars().count() <= 1
            || STOPWORDS.contains(&token.as_str())
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        counts.entry(token).or_insert((0, pos)).0 += 1;
    }
    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(top_k).map(|(t, _)| t).collect()
}

/// Topics whose term lists overlap any of the keywords, in detection order.
pub fn detect_topics(keywords: &[String]) -> Vec<&'static str> {
    let mut topics = Vec::new();
    for keyword in keywords {
        let keyword = keyword.to_lowercase();
        for (topic, terms) in TOPIC_KEYWORDS {
            let hit = terms.iter().any(|t| {
                let t = t.to_lowercase();
                t.contains(&keyword) || keyword.contains(&t)
            });
            if hit && !topics.contains(topic) {
                topics.push(*topic);
            }
        }
    }
    topics
}

/// Word-by-word dictionary translation of common education terms.
pub fn translate_to_english(text: &str) -> String {
    let mut out = text.to_string();
    for (cn, en) in TRANSLATIONS {
        if out.contains(cn) {
            out = out.replace(cn, &format!(" {} ", en));
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn contains_non_ascii(text: &str) -> bool {
    text.chars().any(|c| !c.is_ascii())
}
