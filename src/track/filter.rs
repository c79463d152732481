use crate::read::{AlignedRead, flags};
use crate::types::{FilterFlags, QueryOptions};

/// One exclusion rule: the flag bit it tests and whether it is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rule {
    mask: u16,
    enabled: bool,
}

/// Composed read predicate built from the four filter toggles.
///
/// A read is excluded when any enabled rule matches its flags. Disabled rules
/// never exclude, so enabling a rule can only shrink the accepted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFilter {
    rules: [Rule; 4],
}

impl ReadFilter {
    pub fn new(duplicate: bool, not_primary: bool, vendor_quality_fail: bool, supplementary: bool) -> Self {
        Self {
            rules: [
                Rule { mask: flags::DUPLICATE, enabled: duplicate },
                Rule { mask: flags::SECONDARY, enabled: not_primary },
                Rule { mask: flags::QC_FAIL, enabled: vendor_quality_fail },
                Rule { mask: flags::SUPPLEMENTARY, enabled: supplementary },
            ],
        }
    }

    /// Filter that admits every read.
    pub fn accept_all() -> Self {
        Self::new(false, false, false, false)
    }

    /// Flag bits that cause exclusion.
    pub fn excluded_mask(&self) -> u16 {
        self.rules
            .iter()
            .filter(|rule| rule.enabled)
            .fold(0, |mask, rule| mask | rule.mask)
    }

    pub fn should_include(&self, read: &AlignedRead) -> bool {
        read.flags & self.excluded_mask() == 0
    }
}

impl Default for ReadFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl From<FilterFlags> for ReadFilter {
    fn from(f: FilterFlags) -> Self {
        Self::new(
            f.filter_duplicate,
            f.filter_not_primary,
            f.filter_vendor_quality_fail,
            f.filter_supplementary_alignment,
        )
    }
}

impl From<&QueryOptions> for ReadFilter {
    fn from(options: &QueryOptions) -> Self {
        Self::new(
            options.filter_duplicate,
            options.filter_not_primary,
            options.filter_vendor_quality_fail,
            options.filter_supplementary_alignment,
        )
    }
}

/// Whether `read` passes the filters enabled in `options`.
pub fn should_include(read: &AlignedRead, options: &QueryOptions) -> bool {
    ReadFilter::from(options).should_include(read)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(bits: u16) -> AlignedRead {
        AlignedRead::new("r", 1, "4M".parse().unwrap(), "ACGT").with_flags(bits)
    }

    #[test]
    fn test_disabled_rules_never_exclude() {
        let options = QueryOptions::default();
        let all = flags::DUPLICATE | flags::SECONDARY | flags::QC_FAIL | flags::SUPPLEMENTARY;
        assert!(should_include(&read(all), &options));
    }

    #[test]
    fn test_each_rule_excludes_its_flag() {
        let cases = [
            (ReadFilter::new(true, false, false, false), flags::DUPLICATE),
            (ReadFilter::new(false, true, false, false), flags::SECONDARY),
            (ReadFilter::new(false, false, true, false), flags::QC_FAIL),
            (ReadFilter::new(false, false, false, true), flags::SUPPLEMENTARY),
        ];
        for (filter, bit) in cases {
            assert!(!filter.should_include(&read(bit)));
            assert!(filter.should_include(&read(0)));
            assert!(filter.should_include(&read(flags::REVERSE)));
        }
    }

    #[test]
    fn test_enabling_rules_is_monotone() {
        let reads: Vec<AlignedRead> = (0u16..16)
            .map(|i| {
                let mut bits = 0;
                if i & 1 != 0 { bits |= flags::DUPLICATE; }
                if i & 2 != 0 { bits |= flags::SECONDARY; }
                if i & 4 != 0 { bits |= flags::QC_FAIL; }
                if i & 8 != 0 { bits |= flags::SUPPLEMENTARY; }
                read(bits)
            })
            .collect();

        let mut previous = reads.len();
        let steps = [
            ReadFilter::new(false, false, false, false),
            ReadFilter::new(true, false, false, false),
            ReadFilter::new(true, true, false, false),
            ReadFilter::new(true, true, true, false),
            ReadFilter::new(true, true, true, true),
        ];
        for filter in steps {
            let admitted = reads.iter().filter(|r| filter.should_include(r)).count();
            assert!(admitted <= previous);
            previous = admitted;
        }
        assert_eq!(previous, 1);
    }

    #[test]
    fn test_from_filter_flags() {
        let filter = ReadFilter::from(FilterFlags {
            filter_duplicate: true,
            ..Default::default()
        });
        assert_eq!(filter.excluded_mask(), flags::DUPLICATE);
    }

    #[test]
    fn test_from_query_options() {
        let options = QueryOptions {
            filter_not_primary: true,
            filter_supplementary_alignment: true,
            ..Default::default()
        };
        let filter = ReadFilter::from(&options);
        assert_eq!(filter.excluded_mask(), flags::SECONDARY | flags::SUPPLEMENTARY);
        assert!(!should_include(&read(flags::SUPPLEMENTARY), &options));
        assert!(should_include(&read(flags::DUPLICATE), &options));
    }
}
