//! 播放列表范围表达式解析（例如 `1-3,5,7-9`）。

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::errors::RangeError;

/// 可选的最大位置。YouTube 播放列表最多 5000 个视频，超出的输入直接拒绝，
/// 以免 `1-5000000000` 这类笔误在界面线程上展开出巨大集合。
pub const MAX_POSITION: usize = 5000;

/// 升序、去重、从 0 开始的播放列表位置集合。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet(Vec<usize>);

impl IndexSet {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl From<BTreeSet<usize>> for IndexSet {
    fn from(set: BTreeSet<usize>) -> Self {
        Self(set.into_iter().collect())
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter().collect::<BTreeSet<_>>().into()
    }
}

impl FromStr for IndexSet {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ranges(s)
    }
}

impl fmt::Display for IndexSet {
    /// 以用户视角（从 1 开始）输出，便于日志阅读。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| (i + 1).to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// 把从 1 开始的范围表达式解析为从 0 开始的 [`IndexSet`]。
///
/// 以 `,` 分隔，每一项是 `n` 或闭区间 `start-end`；倒序区间报错而不是视为空。
pub fn parse_ranges(input: &str) -> Result<IndexSet, RangeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RangeError::Empty);
    }

    let mut out = BTreeSet::new();
    for raw in trimmed.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            return Err(RangeError::EmptyToken);
        }

        if token.contains('-') {
            let mut parts = token.split('-');
            let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(RangeError::MalformedPair(token.to_string()));
            };
            let (a, b) = (a.trim(), b.trim());
            if a.is_empty() || b.is_empty() {
                return Err(RangeError::MalformedPair(token.to_string()));
            }
            let start = parse_position(a)?;
            let end = parse_position(b)?;
            if start > end {
                return Err(RangeError::Descending { start, end });
            }
            out.extend((start..=end).map(|n| n - 1));
        } else {
            out.insert(parse_position(token)? - 1);
        }
    }

    Ok(out.into())
}

fn parse_position(token: &str) -> Result<usize, RangeError> {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(RangeError::NotANumber(token.to_string()));
    }
    let value: usize = token
        .parse()
        .map_err(|_| RangeError::NotANumber(token.to_string()))?;
    if value == 0 {
        return Err(RangeError::NotPositive(token.to_string()));
    }
    if value > MAX_POSITION {
        return Err(RangeError::TooLarge {
            value,
            max: MAX_POSITION,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixes_ranges_and_singles() {
        let set = parse_ranges("1-3,5").unwrap();
        assert_eq!(set.as_slice(), &[0, 1, 2, 4]);
    }

    #[test]
    fn collapses_duplicates() {
        assert_eq!(parse_ranges("2,2,2").unwrap().as_slice(), &[1]);
        assert_eq!(parse_ranges("1-4,3-6").unwrap().as_slice(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn output_is_sorted_regardless_of_input_order() {
        let set = parse_ranges("9, 7-8 ,1").unwrap();
        assert_eq!(set.as_slice(), &[0, 6, 7, 8]);
        assert_eq!(set.to_string(), "1,7,8,9");
    }

    #[test]
    fn single_value_pair() {
        assert_eq!(parse_ranges("4-4").unwrap().as_slice(), &[3]);
    }

    #[test]
    fn rejects_descending_pair() {
        assert_eq!(
            parse_ranges("5-3"),
            Err(RangeError::Descending { start: 5, end: 3 })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_ranges("a"), Err(RangeError::NotANumber(_))));
        assert!(matches!(parse_ranges("1-b"), Err(RangeError::NotANumber(_))));
        assert!(matches!(parse_ranges("1-2-3"), Err(RangeError::MalformedPair(_))));
        assert!(matches!(parse_ranges("-3"), Err(RangeError::MalformedPair(_))));
        assert!(matches!(parse_ranges("+3"), Err(RangeError::NotANumber(_))));
        assert_eq!(parse_ranges("1,,2"), Err(RangeError::EmptyToken));
        assert_eq!(parse_ranges("   "), Err(RangeError::Empty));
    }

    #[test]
    fn rejects_zero() {
        assert!(matches!(parse_ranges("0"), Err(RangeError::NotPositive(_))));
        assert!(matches!(parse_ranges("0-2"), Err(RangeError::NotPositive(_))));
    }

    #[test]
    fn positions_past_the_limit_are_rejected_up_front() {
        assert_eq!(
            parse_ranges("1-50000000"),
            Err(RangeError::TooLarge {
                value: 50_000_000,
                max: MAX_POSITION
            })
        );
        assert!(matches!(parse_ranges("5001"), Err(RangeError::TooLarge { .. })));
        assert!(matches!(
            parse_ranges("99999999999999999999999"),
            Err(RangeError::NotANumber(_))
        ));
        assert_eq!(parse_ranges("1-5000").unwrap().len(), MAX_POSITION);
    }

    #[test]
    fn from_str_matches_parse() {
        let set: IndexSet = "3,1".parse().unwrap();
        assert_eq!(set.as_slice(), &[0, 2]);
    }
}
