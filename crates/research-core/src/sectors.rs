//! Sector calibration: per-industry DCF assumptions and the resolution chain
//! from a holding's sector tag or a company's SIC code/description down to
//! one of ~17 predefined industry profiles, with a general-business default.

use crate::types::CompanyProfile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Software,
    Semiconductors,
    Pharma,
    Banking,
    Insurance,
    Retail,
    Restaurants,
    Energy,
    Utilities,
    Telecom,
    Media,
    Industrials,
    Autos,
    Aerospace,
    ConsumerStaples,
    Transportation,
    RealEstate,
    General,
}

impl Sector {
    pub fn label(&self) -> &'static str {
        match self {
            Sector::Software => "Software",
            Sector::Semiconductors => "Semiconductors",
            Sector::Pharma => "Pharmaceuticals",
            Sector::Banking => "Banking",
            Sector::Insurance => "Insurance",
            Sector::Retail => "Retail",
            Sector::Restaurants => "Restaurants",
            Sector::Energy => "Energy",
            Sector::Utilities => "Utilities",
            Sector::Telecom => "Telecom",
            Sector::Media => "Media",
            Sector::Industrials => "Industrials",
            Sector::Autos => "Automotive",
            Sector::Aerospace => "Aerospace & Defense",
            Sector::ConsumerStaples => "Consumer Staples",
            Sector::Transportation => "Transportation",
            Sector::RealEstate => "Real Estate",
            Sector::General => "General Business",
        }
    }
}

/// DCF calibration constants for one industry. Margins, growth rates and WACC
/// bounds are decimals (0.20 = 20%); the exit multiple applies to year-5
/// operating income.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SectorProfile {
    pub sector: Sector,
    pub target_operating_margin: f64,
    pub exit_multiple: f64,
    pub fcf_conversion: f64,
    pub default_growth: f64,
    pub terminal_growth: f64,
    pub wacc_floor: f64,
    pub wacc_ceiling: f64,
}

const fn profile(
    sector: Sector,
    target_operating_margin: f64,
    exit_multiple: f64,
    fcf_conversion: f64,
    default_growth: f64,
    terminal_growth: f64,
    wacc_floor: f64,
    wacc_ceiling: f64,
) -> SectorProfile {
    SectorProfile {
        sector,
        target_operating_margin,
        exit_multiple,
        fcf_conversion,
        default_growth,
        terminal_growth,
        wacc_floor,
        wacc_ceiling,
    }
}

pub fn profile_for(sector: Sector) -> SectorProfile {
    match sector {
        Sector::Software => profile(Sector::Software, 0.20, 25.0, 0.90, 0.12, 0.03, 0.08, 0.13),
        Sector::Semiconductors => profile(Sector::Semiconductors, 0.25, 18.0, 0.80, 0.10, 0.03, 0.09, 0.14),
        Sector::Pharma => profile(Sector::Pharma, 0.22, 16.0, 0.85, 0.06, 0.025, 0.07, 0.12),
        Sector::Banking => profile(Sector::Banking, 0.30, 10.0, 0.70, 0.04, 0.02, 0.08, 0.12),
        Sector::Insurance => profile(Sector::Insurance, 0.12, 11.0, 0.75, 0.04, 0.02, 0.07, 0.11),
        Sector::Retail => profile(Sector::Retail, 0.06, 12.0, 0.70, 0.04, 0.02, 0.07, 0.11),
        Sector::Restaurants => profile(Sector::Restaurants, 0.12, 15.0, 0.75, 0.05, 0.025, 0.07, 0.11),
        Sector::Energy => profile(Sector::Energy, 0.15, 8.0, 0.60, 0.03, 0.015, 0.08, 0.13),
        Sector::Utilities => profile(Sector::Utilities, 0.18, 12.0, 0.65, 0.03, 0.02, 0.05, 0.09),
        Sector::Telecom => profile(Sector::Telecom, 0.16, 9.0, 0.65, 0.02, 0.015, 0.06, 0.10),
        Sector::Media => profile(Sector::Media, 0.15, 13.0, 0.80, 0.05, 0.025, 0.07, 0.12),
        Sector::Industrials => profile(Sector::Industrials, 0.12, 13.0, 0.75, 0.04, 0.02, 0.07, 0.11),
        Sector::Autos => profile(Sector::Autos, 0.07, 9.0, 0.55, 0.03, 0.015, 0.08, 0.13),
        Sector::Aerospace => profile(Sector::Aerospace, 0.11, 14.0, 0.75, 0.05, 0.025, 0.07, 0.11),
        Sector::ConsumerStaples => profile(Sector::ConsumerStaples, 0.14, 16.0, 0.85, 0.03, 0.02, 0.06, 0.09),
        Sector::Transportation => profile(Sector::Transportation, 0.10, 10.0, 0.60, 0.03, 0.02, 0.07, 0.11),
        Sector::RealEstate => profile(Sector::RealEstate, 0.30, 14.0, 0.70, 0.03, 0.02, 0.06, 0.10),
        Sector::General => profile(Sector::General, 0.10, 12.0, 0.75, 0.04, 0.02, 0.07, 0.12),
    }
}

/// Keyword tables for SIC-description and sector-tag matching.
const KEYWORDS: &[(&str, Sector)] = &[
    ("software", Sector::Software),
    ("prepackaged", Sector::Software),
    ("information technology", Sector::Software),
    ("computer services", Sector::Software),
    ("semiconductor", Sector::Semiconductors),
    ("pharma", Sector::Pharma),
    ("biolog", Sector::Pharma),
    ("biotech", Sector::Pharma),
    ("drug", Sector::Pharma),
    ("health", Sector::Pharma),
    ("bank", Sector::Banking),
    ("savings institution", Sector::Banking),
    ("financ", Sector::Banking),
    ("insurance", Sector::Insurance),
    ("restaurant", Sector::Restaurants),
    ("eating place", Sector::Restaurants),
    ("retail", Sector::Retail),
    ("store", Sector::Retail),
    ("oil", Sector::Energy),
    ("gas", Sector::Energy),
    ("petroleum", Sector::Energy),
    ("energy", Sector::Energy),
    ("mining", Sector::Energy),
    ("electric service", Sector::Utilities),
    ("utilit", Sector::Utilities),
    ("water supply", Sector::Utilities),
    ("telecom", Sector::Telecom),
    ("telephone", Sector::Telecom),
    ("broadcast", Sector::Media),
    ("media", Sector::Media),
    ("entertainment", Sector::Media),
    ("motion picture", Sector::Media),
    ("publishing", Sector::Media),
    ("motor vehicle", Sector::Autos),
    ("auto", Sector::Autos),
    ("aircraft", Sector::Aerospace),
    ("aerospace", Sector::Aerospace),
    ("defense", Sector::Aerospace),
    ("guided missile", Sector::Aerospace),
    ("food", Sector::ConsumerStaples),
    ("beverage", Sector::ConsumerStaples),
    ("tobacco", Sector::ConsumerStaples),
    ("household", Sector::ConsumerStaples),
    ("consumer", Sector::ConsumerStaples),
    ("railroad", Sector::Transportation),
    ("air transport", Sector::Transportation),
    ("trucking", Sector::Transportation),
    ("transport", Sector::Transportation),
    ("real estate", Sector::RealEstate),
    ("reit", Sector::RealEstate),
    ("industrial", Sector::Industrials),
    ("machinery", Sector::Industrials),
    ("manufactur", Sector::Industrials),
];

fn match_keywords(text: &str) -> Option<Sector> {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, sector)| *sector)
}

/// Map a numeric SIC code into a sector via standard major-group ranges.
fn match_sic_code(code: &str) -> Option<Sector> {
    let code: u32 = code.trim().parse().ok()?;
    let sector = match code {
        3674 | 3670..=3679 => Sector::Semiconductors,
        7370..=7379 | 3570..=3579 => Sector::Software,
        2830..=2839 | 3840..=3859 | 8000..=8099 | 8731 => Sector::Pharma,
        6020..=6199 | 6710..=6719 => Sector::Banking,
        6300..=6419 => Sector::Insurance,
        5812 | 5813 => Sector::Restaurants,
        5200..=5999 => Sector::Retail,
        1000..=1499 | 2900..=2999 => Sector::Energy,
        4900..=4991 => Sector::Utilities,
        4810..=4899 => Sector::Telecom,
        2710..=2749 | 7810..=7849 | 4830..=4841 => Sector::Media,
        3711..=3716 | 3751 | 5500..=5599 => Sector::Autos,
        3720..=3729 | 3760..=3769 => Sector::Aerospace,
        2000..=2199 => Sector::ConsumerStaples,
        4000..=4789 => Sector::Transportation,
        6500..=6799 => Sector::RealEstate,
        3400..=3599 | 3600..=3669 | 3800..=3839 => Sector::Industrials,
        _ => return None,
    };
    Some(sector)
}

/// Resolve a company's sector: explicit holding-set tag first, then SIC
/// description fuzzy match, then SIC code range, then the default.
pub fn resolve_sector(explicit_tag: Option<&str>, profile: &CompanyProfile) -> Sector {
    if let Some(sector) = explicit_tag.and_then(match_keywords) {
        return sector;
    }
    if let Some(sector) = profile.sic_description.as_deref().and_then(match_keywords) {
        return sector;
    }
    if let Some(sector) = profile.sic_code.as_deref().and_then(match_sic_code) {
        return sector;
    }
    Sector::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_profile_calibration() {
        let p = profile_for(Sector::Software);
        assert_eq!(p.target_operating_margin, 0.20);
        assert_eq!(p.terminal_growth, 0.03);
        assert_eq!(p.exit_multiple, 25.0);
    }

    #[test]
    fn resolution_prefers_explicit_tag() {
        let profile = CompanyProfile {
            symbol: "X".to_string(),
            sic_description: Some("Crude Petroleum and Natural Gas".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_sector(Some("Software"), &profile), Sector::Software);
        assert_eq!(resolve_sector(None, &profile), Sector::Energy);
    }

    #[test]
    fn resolution_falls_back_to_sic_code_then_default() {
        let by_code = CompanyProfile {
            symbol: "X".to_string(),
            sic_code: Some("3674".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_sector(None, &by_code), Sector::Semiconductors);

        let unknown = CompanyProfile {
            symbol: "X".to_string(),
            sic_code: Some("0111".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_sector(None, &unknown), Sector::General);
    }

    #[test]
    fn every_sector_has_sane_wacc_bounds() {
        for sector in [
            Sector::Software,
            Sector::Semiconductors,
            Sector::Pharma,
            Sector::Banking,
            Sector::Insurance,
            Sector::Retail,
            Sector::Restaurants,
            Sector::Energy,
            Sector::Utilities,
            Sector::Telecom,
            Sector::Media,
            Sector::Industrials,
            Sector::Autos,
            Sector::Aerospace,
            Sector::ConsumerStaples,
            Sector::Transportation,
            Sector::RealEstate,
            Sector::General,
        ] {
            let p = profile_for(sector);
            assert!(p.wacc_floor < p.wacc_ceiling);
            assert!(p.terminal_growth < p.wacc_floor);
            assert!(p.fcf_conversion >= 0.3 && p.fcf_conversion <= 1.0);
        }
    }
}
