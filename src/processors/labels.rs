//! List label recognition.
//!
//! A label is the marker opening a list item: a bullet glyph, a number,
//! a roman numeral, a letter, a Korean syllable from the 가나다 sequence
//! or an enclosed (circled, parenthesized) character. Two labels belong
//! to one list when they share prefix and suffix and the second one
//! advances the ordinal by exactly one.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{NumberingStyle, TextLine};

/// Glyphs accepted as bullets at the start of a line.
pub const BULLET_GLYPHS: &str = "∘*+-.=‐‑‒–—―•‣․‧※⁃⁎→↳⇒⇨⇾∙■□▢▣▤▥▦▧▨▩▪▬▭▮▯▰▱▲△▴▵▶▷▸▹►▻▼▽▾▿◀◁◂◃◄◅◆◇◈◉◊○◌◍◎●◐◑◒◓◔◕◖◗◘◙◢◣◤◥◦◧◨◩◪◫◬◭◮◯◰◱◲◳◴◵◶◷◸◹◺◻◼◽◾◿★☆☐☑☒☓☛☞♠♡♢♣♤♥♦♧⚪⚫⚬✓✔✕✖✗✘✙✚✛✜✝✞✟✦✧✨❍❏❐❑❒❖➔➙➛➜➝➞➟➠➡➢➣➤➥➦➧➨➩➪➭➮➯➱⬛⬜⬝⬞⬟⬠⬡⬢⬣⬤⬥⬦⬧⬨⬩⬪⬫⬬⬭⬮⬯⭐⭑⭒⭓⭔⭕⭖⭗⭘⭙⯀⯁⯂⯃⯄⯅⯆⯇⯈⯌⯍⯎⯏⯐〇󰁾󰋪󰋫󰋬󰋭󰋮󰋯󰋰󰋱󰋲󰋳󰋴󰋵󰋶󰋷󰋸󰋹󰋺󰋻󰋼";

/// Korean syllables used as ordinals, in order.
const KOREAN_ORDINALS: &str = "가나다라마바사아자차카타파하";

/// Syllables accepted as Korean labels by [`is_labeled_line`].
const KOREAN_NUMBERS: &str = "[가나다라마바사아자차카타파하거너더러머버서어저처커터퍼허고노도로모보소오조초코토포호구누두루무부수우주추쿠투푸후그느드르므브스으즈츠크트프흐기니디리미비시이지치키티피히]";

/// Enclosed-character blocks: first code point, length, numbering style.
const ENCLOSED_FAMILIES: &[(u32, u32, NumberingStyle)] = &[
    (0x2160, 12, NumberingStyle::UpperRoman),
    (0x2170, 12, NumberingStyle::LowerRoman),
    (0x2460, 20, NumberingStyle::Circled),
    (0x2474, 20, NumberingStyle::Circled),
    (0x2488, 20, NumberingStyle::Circled),
    (0x249C, 26, NumberingStyle::LowerLatin),
    (0x24B6, 26, NumberingStyle::UpperLatin),
    (0x24D0, 26, NumberingStyle::LowerLatin),
    (0x24F5, 10, NumberingStyle::Circled),
    (0x2776, 10, NumberingStyle::Circled),
    (0x2780, 10, NumberingStyle::Circled),
    (0x278A, 10, NumberingStyle::Circled),
    (0x326E, 14, NumberingStyle::Korean),
];

/// What kind of marker a label is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelKind {
    /// Bullet glyph
    Bullet(char),
    /// One character from an enclosed block
    Enclosed {
        family: u32,
        ordinal: u32,
        style: NumberingStyle,
    },
    /// Number, letter or numeral with optional brackets
    Numbered,
}

/// A parsed list label.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Opening bracket, if any
    pub prefix: String,
    /// Number, letter or numeral text
    pub body: String,
    /// Closing punctuation, if any
    pub suffix: String,
    pub kind: LabelKind,
    /// Characters covered by the label, trailing whitespace included
    pub len: usize,
}

fn numbered_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<prefix>[(\[{<【]?)(?P<body>[0-9]+|[A-Za-z]+|[가나다라마바사아자차카타파하])(?P<suffix>[.)\]:>}】]?)")
            .expect("label pattern is valid")
    })
}

fn bullet_patterns() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let k = KOREAN_NUMBERS;
        let alternatives = [
            r"\(\d+\)".to_string(),
            r"\d+[.)]\s+".to_string(),
            r"[ㄱㄴㄷㄹㅁㅂㅅㅇㅈㅊㅋㅌㅍㅎ][.)\]>]".to_string(),
            format!(r"{k}\..+"),
            format!(r"{k}[)\]>]"),
            format!(r"{k}-\d+"),
            format!(r"\({k}\)"),
            format!(r"<{k}>"),
            format!(r"\[{k}\]"),
            format!(r"\{{{k}\}}"),
            r"제\d+[장조절]".to_string(),
            r"법\.제\d+조".to_string(),
            r"I\.".to_string(),
            r"[\x{2160}-\x{216B}\x{2170}-\x{217B}\x{2460}-\x{24FE}\x{2776}-\x{2793}\x{326E}-\x{327B}\x{F081}-\x{F08A}\x{F08C}-\x{F095}]".to_string(),
        ];
        Regex::new(&format!("^(?:{})", alternatives.join("|"))).expect("bullet patterns are valid")
    })
}

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+\.\d+$").expect("decimal pattern is valid"))
}

/// Whether `text` is a decimal number such as `3.14`.
pub fn is_decimal(text: &str) -> bool {
    decimal_pattern().is_match(text.trim())
}

/// Whether the line opens with a bullet, an enumeration marker or a
/// connected line-art bullet.
pub fn is_labeled_line(line: &TextLine) -> bool {
    let Some(first) = line.text.chars().next() else {
        return line.label_box.is_some();
    };
    BULLET_GLYPHS.contains(first) || line.label_box.is_some() || bullet_patterns().is_match(&line.text)
}

fn closing_bracket(prefix: &str) -> Option<&'static str> {
    match prefix {
        "(" => Some(")"),
        "[" => Some("]"),
        "{" => Some("}"),
        "<" => Some(">"),
        "【" => Some("】"),
        _ => None,
    }
}

fn roman_value(body: &str) -> Option<u32> {
    if body.is_empty() {
        return None;
    }
    let upper = body.chars().all(|c| c.is_ascii_uppercase());
    let lower = body.chars().all(|c| c.is_ascii_lowercase());
    if !upper && !lower {
        return None;
    }
    let mut total = 0u32;
    let mut previous = 0u32;
    for c in body.chars().rev() {
        let value = match c.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        };
        if value < previous {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            previous = value;
        }
    }
    // reject non-canonical forms such as "IIII" or "VX"
    (to_roman(total) == body.to_ascii_uppercase()).then_some(total)
}

fn to_roman(mut value: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for &(n, s) in TABLE {
        while value >= n {
            out.push_str(s);
            value -= n;
        }
    }
    out
}

impl Label {
    /// Parse the label at the start of `text`.
    ///
    /// Returns `Ok(None)` when the text does not open with a label and
    /// `Err` when it opens with a label whose ordinal cannot be read.
    pub fn parse(text: &str) -> Result<Option<Label>, String> {
        let text = text.trim_start();
        let Some(first) = text.chars().next() else {
            return Ok(None);
        };
        let trailing = |consumed: usize| -> usize {
            consumed + text.chars().skip(consumed).take_while(|c| c.is_whitespace()).count()
        };

        let code = first as u32;
        if let Some(&(family, _, style)) = ENCLOSED_FAMILIES
            .iter()
            .find(|(base, count, _)| code >= *base && code < base + count)
        {
            return Ok(Some(Label {
                prefix: String::new(),
                body: first.to_string(),
                suffix: String::new(),
                kind: LabelKind::Enclosed {
                    family,
                    ordinal: code - family + 1,
                    style,
                },
                len: trailing(1),
            }));
        }

        if let Some(caps) = numbered_pattern().captures(text) {
            let prefix = &caps["prefix"];
            let body = &caps["body"];
            let suffix = &caps["suffix"];
            let paired = match closing_bracket(prefix) {
                Some(close) => suffix == close,
                None => matches!(suffix, "." | ")" | "]" | ":"),
            };
            let rest = &text[caps.get(0).map(|m| m.end()).unwrap_or(0)..];
            let is_digits = body.chars().all(|c| c.is_ascii_digit());
            let separated = rest.is_empty() || rest.starts_with(char::is_whitespace) || is_digits;
            let letters_ok = is_digits || body.chars().count() == 1 || roman_value(body).is_some();
            if paired && separated && letters_ok {
                if is_digits && body.parse::<u32>().is_err() {
                    return Err(format!("label number '{}' is out of range", body));
                }
                let consumed = prefix.chars().count() + body.chars().count() + suffix.chars().count();
                return Ok(Some(Label {
                    prefix: prefix.to_string(),
                    body: body.to_string(),
                    suffix: suffix.to_string(),
                    kind: LabelKind::Numbered,
                    len: trailing(consumed),
                }));
            }
        }

        if BULLET_GLYPHS.contains(first) {
            return Ok(Some(Label {
                prefix: String::new(),
                body: first.to_string(),
                suffix: String::new(),
                kind: LabelKind::Bullet(first),
                len: trailing(1),
            }));
        }
        Ok(None)
    }

    pub fn is_bullet(&self) -> bool {
        matches!(self.kind, LabelKind::Bullet(_))
    }

    /// Every (style, ordinal) reading of the label.
    ///
    /// A body such as `I` or `c` is ambiguous between a roman numeral and
    /// a letter; the list context decides.
    pub fn readings(&self) -> Vec<(NumberingStyle, u32)> {
        match self.kind {
            LabelKind::Bullet(_) => vec![(NumberingStyle::Unordered, 0)],
            LabelKind::Enclosed { ordinal, style, .. } => vec![(style, ordinal)],
            LabelKind::Numbered => ordinal_readings(&self.body),
        }
    }
}

/// Every (style, ordinal) reading of a bare ordinal token such as `12`,
/// `iv`, `C` or `다`.
pub fn ordinal_readings(body: &str) -> Vec<(NumberingStyle, u32)> {
    let mut readings = Vec::new();
    if let Ok(n) = body.parse::<u32>() {
        readings.push((NumberingStyle::Arabic, n));
        return readings;
    }
    if let Some(n) = roman_value(body) {
        let style = if body.chars().all(|c| c.is_ascii_uppercase()) {
            NumberingStyle::UpperRoman
        } else {
            NumberingStyle::LowerRoman
        };
        readings.push((style, n));
    }
    let mut chars = body.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_uppercase() {
            readings.push((NumberingStyle::UpperLatin, c as u32 - 'A' as u32 + 1));
        } else if c.is_ascii_lowercase() {
            readings.push((NumberingStyle::LowerLatin, c as u32 - 'a' as u32 + 1));
        } else if let Some(i) = KOREAN_ORDINALS.chars().position(|k| k == c) {
            readings.push((NumberingStyle::Korean, i as u32 + 1));
        }
    }
    readings
}

/// Style under which `next` directly follows `prev` in one list.
///
/// When `style` is given only that reading is considered.
pub fn follows(prev: &Label, next: &Label, style: Option<NumberingStyle>) -> Option<NumberingStyle> {
    let allowed = |s: NumberingStyle| style.map(|expected| expected == s).unwrap_or(true);
    match (prev.kind, next.kind) {
        (LabelKind::Bullet(a), LabelKind::Bullet(b)) => {
            (a == b && allowed(NumberingStyle::Unordered)).then_some(NumberingStyle::Unordered)
        }
        (
            LabelKind::Enclosed {
                family: fa,
                ordinal: oa,
                style: sa,
            },
            LabelKind::Enclosed {
                family: fb,
                ordinal: ob,
                ..
            },
        ) => (fa == fb && ob == oa + 1 && allowed(sa)).then_some(sa),
        (LabelKind::Numbered, LabelKind::Numbered) => {
            if prev.prefix != next.prefix || prev.suffix != next.suffix {
                return None;
            }
            let previous = prev.readings();
            next.readings().into_iter().find_map(|(s, n)| {
                (allowed(s) && n > 0 && previous.contains(&(s, n - 1))).then_some(s)
            })
        }
        _ => None,
    }
}

/// Whether the labels form one list in order.
pub fn is_one_sequence(labels: &[Label]) -> bool {
    if labels.len() < 2 {
        return false;
    }
    let mut style = None;
    for pair in labels.windows(2) {
        match follows(&pair[0], &pair[1], style) {
            Some(s) => style = Some(s),
            None => return false,
        }
    }
    true
}
