use std::fmt;

/// Per-record reconciliation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remark {
    /// The opposite partition holds a record with the same track id.
    AutoReversal,
    /// No counterpart yet; carries the settlement day when it parsed.
    PendingRefund(Option<u32>),
    /// A pending record whose counterpart showed up in a later snapshot. Terminal.
    SystemRefund,
    /// Placeholder for carryover input that never had a remark column.
    Pending,
}

impl Remark {
    /// Cross-link presence wins over everything; then the settlement day decides the label.
    pub fn derive(has_cross_link: bool, settle_day: Option<u32>) -> Self {
        if has_cross_link {
            Self::AutoReversal
        } else {
            Self::PendingRefund(settle_day)
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingRefund(_) | Self::Pending)
    }
}

impl fmt::Display for Remark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoReversal => write!(f, "Auto Reversal"),
            Self::PendingRefund(Some(day)) => write!(f, "Pending Refund {day}"),
            Self::PendingRefund(None) => write!(f, "Pending Refund"),
            Self::SystemRefund => write!(f, "System Refund"),
            Self::Pending => write!(f, "Pending"),
        }
    }
}

/// How a remark's "Pending" prefix is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixMatch {
    Exact,
    IgnoreCase,
}

const PENDING_PREFIX: &str = "Pending";

/// Whether a remark text marks an unresolved record.
pub fn is_pending(text: &str, mode: PrefixMatch) -> bool {
    match mode {
        PrefixMatch::Exact => text.starts_with(PENDING_PREFIX),
        PrefixMatch::IgnoreCase => text
            .get(..PENDING_PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(PENDING_PREFIX)),
    }
}

/// Worklist quoting: `'value',`. Consumed verbatim downstream; keep the shape.
pub fn worklist_quote(udf1: Option<&str>) -> String {
    format!("'{}',", udf1.unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_link_beats_settle_day() {
        assert_eq!(Remark::derive(true, Some(12)), Remark::AutoReversal);
        assert_eq!(Remark::derive(true, None), Remark::AutoReversal);
    }

    #[test]
    fn pending_labels() {
        assert_eq!(Remark::derive(false, Some(12)).to_string(), "Pending Refund 12");
        assert_eq!(Remark::derive(false, None).to_string(), "Pending Refund");
        assert_eq!(Remark::SystemRefund.to_string(), "System Refund");
        assert!(Remark::Pending.is_pending());
        assert!(!Remark::AutoReversal.is_pending());
    }

    #[test]
    fn prefix_modes() {
        assert!(is_pending("Pending Refund 3", PrefixMatch::Exact));
        assert!(!is_pending("pending refund", PrefixMatch::Exact));
        assert!(is_pending("pending refund", PrefixMatch::IgnoreCase));
        assert!(is_pending("PENDING", PrefixMatch::IgnoreCase));
        assert!(!is_pending("Pend", PrefixMatch::IgnoreCase));
        assert!(!is_pending("System Refund", PrefixMatch::IgnoreCase));
        assert!(!is_pending("Pé", PrefixMatch::IgnoreCase));
    }

    #[test]
    fn worklist_quoting() {
        assert_eq!(worklist_quote(Some("ORD-1")), "'ORD-1',");
        assert_eq!(worklist_quote(None), "'',");
    }
}
