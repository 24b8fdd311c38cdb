//! Closed table of recognized top-level domains.
//!
//! A dotted name only classifies as a `Domain` signature when its last label
//! is in this table. The table is the ISO country codes, the generic TLDs,
//! and the IDN punycode (`XN--`) entries; matching is case-insensitive.

/// Recognized top-level domains, uppercase.
pub const TLDS: &[&str] = &[
    "AC", "AD", "AE", "AERO", "AF", "AG", "AI", "AL", "AM", "AN", "AO", "AQ", "AR", "ARPA", "AS",
    "ASIA", "AT", "AU", "AW", "AX", "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BIZ",
    "BJ", "BM", "BN", "BO", "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CAT", "CC", "CD",
    "CF", "CG", "CH", "CI", "CK", "CL", "CM", "CN", "CO", "COM", "COOP", "CR", "CU", "CV", "CX",
    "CY", "CZ", "DE", "DJ", "DK", "DM", "DO", "DZ", "EC", "EDU", "EE", "EG", "ER", "ES", "ET",
    "EU", "FI", "FJ", "FK", "FM", "FO", "FR", "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI",
    "GL", "GM", "GN", "GOV", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY", "HK", "HM", "HN",
    "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN", "INFO", "INT", "IO", "IQ", "IR", "IS", "IT",
    "JE", "JM", "JO", "JOBS", "JP", "KE", "KG", "KH", "KI", "KM", "KN", "KP", "KR", "KW", "KY",
    "KZ", "LA", "LB", "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV", "LY", "MA", "MC", "MD",
    "ME", "MG", "MH", "MIL", "MK", "ML", "MM", "MN", "MO", "MOBI", "MP", "MQ", "MR", "MS", "MT",
    "MU", "MUSEUM", "MV", "MW", "MX", "MY", "MZ", "NA", "NAME", "NC", "NE", "NET", "NF", "NG",
    "NI", "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "ORG", "PA", "PE", "PF", "PG", "PH", "PK",
    "PL", "PM", "PN", "PR", "PRO", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW",
    "SA", "SB", "SC", "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR",
    "ST", "SU", "SV", "SY", "SZ", "TC", "TD", "TEL", "TF", "TG", "TH", "TJ", "TK", "TL", "TM",
    "TN", "TO", "TP", "TR", "TRAVEL", "TT", "TV", "TW", "TZ", "UA", "UG", "UK", "US", "UY", "UZ",
    "VA", "VC", "VE", "VG", "VI", "VN", "VU", "WF", "WS", "XN--0ZWM56D", "XN--11B5BS3A9AJ6G",
    "XN--3E0B707E", "XN--45BRJ9C", "XN--80AKHBYKNJ4F", "XN--90A3AC", "XN--9T4B11YI5A",
    "XN--CLCHC0EA0B2G2A9GCD", "XN--DEBA0AD", "XN--FIQS8S", "XN--FIQZ9S", "XN--FPCRJ9C3D",
    "XN--FZC2C9E2C", "XN--G6W251D", "XN--GECRJ9C", "XN--H2BRJ9C", "XN--HGBK6AJ7F53BBA",
    "XN--HLCJ6AYA9ESC7A", "XN--J6W193G", "XN--JXALPDLP", "XN--KGBECHTV", "XN--KPRW13D",
    "XN--KPRY57D", "XN--LGBBAT1AD8J", "XN--MGBAAM7A8H", "XN--MGBAYH7GPA", "XN--MGBBH1A71E",
    "XN--MGBC0A9AZCG", "XN--MGBERP4A5D4AR", "XN--O3CW4H", "XN--OGBPF8FL", "XN--P1AI",
    "XN--PGBS0DH", "XN--S9BRJ9C", "XN--WGBH1C", "XN--WGBL6A", "XN--XKC2AL3HYE2A",
    "XN--XKC2DL3A5EE0H", "XN--YFRO4I67O", "XN--YGBI2AMMX", "XN--ZCKZAH", "XXX", "YE", "YT",
    "ZA", "ZM", "ZW",
];

/// Whether `label` is a recognized TLD, ignoring case.
pub fn is_tld(label: &str) -> bool {
    TLDS.iter().any(|tld| tld.eq_ignore_ascii_case(label))
}

/// `TLD1|TLD2|...` alternation for embedding in the domain regex.
pub(crate) fn alternation() -> String {
    TLDS.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tlds() {
        assert!(is_tld("com"));
        assert!(is_tld("COM"));
        assert!(is_tld("museum"));
        assert!(is_tld("xn--p1ai"));
    }

    #[test]
    fn unknown_tlds() {
        assert!(!is_tld("local"));
        assert!(!is_tld("notatld"));
        assert!(!is_tld(""));
    }
}
