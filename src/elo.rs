use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model_params::EloParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishKind {
    #[serde(rename = "REG")]
    Regulation,
    #[serde(rename = "OT")]
    Overtime,
    #[serde(rename = "SO")]
    Shootout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub home: f64,
    pub away: f64,
    pub delta: f64,
    pub expected_home: f64,
    pub k: f64,
    pub mov: f64,
}

/// Home-side outcome score. Overtime and shootout results count for less
/// than a regulation win.
pub fn outcome_score(home_won: bool, kind: FinishKind) -> f64 {
    let winner = match kind {
        FinishKind::Regulation => 1.0,
        FinishKind::Overtime => 0.85,
        FinishKind::Shootout => 0.75,
    };
    if home_won { winner } else { 1.0 - winner }
}

pub fn expected_home(r_home: f64, r_away: f64, home_adv: f64, cfg: &EloParams) -> f64 {
    let r_home_adj = r_home + home_adv;
    1.0 / (1.0 + 10.0_f64.powf((r_away - r_home_adj) / cfg.scale))
}

pub fn mov_multiplier(goal_diff: i32, r_home: f64, r_away: f64, home_adv: f64, cfg: &EloParams) -> f64 {
    let gd = goal_diff.abs().min(cfg.mov_goal_cap) as f64;
    let rdiff = ((r_home + home_adv) - r_away).abs();
    (gd + 1.0).ln() * (2.2 / (0.001 * rdiff + 2.2))
}

pub fn k_factor(game_date: NaiveDate, cfg: &EloParams) -> f64 {
    match game_date.month() {
        10 | 11 => cfg.k_oct_nov,
        12 => cfg.k_dec,
        1 | 2 => cfg.k_jan_feb,
        3 | 4 => cfg.k_mar_apr,
        _ => cfg.k_other,
    }
}

pub fn update_ratings(
    r_home: f64,
    r_away: f64,
    s_home: f64,
    goal_diff: i32,
    game_date: NaiveDate,
    home_adv: f64,
    cfg: &EloParams,
) -> RatingUpdate {
    let expected_home = expected_home(r_home, r_away, home_adv, cfg);
    let k = k_factor(game_date, cfg);
    let mov = mov_multiplier(goal_diff, r_home, r_away, home_adv, cfg);
    let delta = k * mov * (s_home - expected_home);
    RatingUpdate {
        home: r_home + delta,
        away: r_away - delta,
        delta,
        expected_home,
        k,
        mov,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn even_teams_with_base_home_edge() {
        let cfg = EloParams::default();
        let p = expected_home(1500.0, 1500.0, 55.0, &cfg);
        let want = 1.0 / (1.0 + 10.0_f64.powf(-55.0 / 400.0));
        assert!((p - want).abs() < 1e-12);
        assert!((p - 0.5785).abs() < 1e-4);
    }

    #[test]
    fn november_one_goal_regulation_win() {
        let cfg = EloParams::default();
        let up = update_ratings(1500.0, 1500.0, 1.0, 1, day(2024, 11, 12), 55.0, &cfg);
        let mov = 2.0_f64.ln() * (2.2 / (0.001 * 55.0 + 2.2));
        assert_eq!(up.k, 28.0);
        assert!((up.mov - mov).abs() < 1e-12);
        let delta = 28.0 * mov * (1.0 - up.expected_home);
        assert!((up.delta - delta).abs() < 1e-12);
        assert!(up.home > 1500.0);
        assert!(up.away < 1500.0);
        assert!(((up.home - 1500.0) + (up.away - 1500.0)).abs() < 1e-9);
    }

    #[test]
    fn update_is_zero_sum() {
        let cfg = EloParams::default();
        let cases = [
            (1612.0, 1433.0, 0.0, -4, day(2025, 1, 3), 40.0),
            (1400.0, 1580.0, 0.85, 1, day(2024, 12, 20), 85.0),
            (1500.0, 1500.0, 0.25, -1, day(2025, 4, 2), 25.0),
        ];
        for (rh, ra, s, gd, d, h) in cases {
            let up = update_ratings(rh, ra, s, gd, d, h, &cfg);
            assert!(((up.home - rh) + (up.away - ra)).abs() < 1e-9);
        }
    }

    #[test]
    fn expected_stays_strictly_inside_unit_interval() {
        let cfg = EloParams::default();
        for gap in [-1500.0, -400.0, 0.0, 400.0, 1500.0] {
            let p = expected_home(1500.0 + gap, 1500.0, 55.0, &cfg);
            assert!(p > 0.0 && p < 1.0, "gap {gap} gave {p}");
        }
    }

    #[test]
    fn goal_differential_is_capped() {
        let cfg = EloParams::default();
        let three = mov_multiplier(3, 1500.0, 1500.0, 0.0, &cfg);
        let seven = mov_multiplier(-7, 1500.0, 1500.0, 0.0, &cfg);
        assert_eq!(three, seven);
        assert!((three - 4.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn k_schedule_by_month() {
        let cfg = EloParams::default();
        let got: Vec<f64> = [10, 11, 12, 1, 2, 3, 4, 5, 9]
            .iter()
            .map(|m| k_factor(day(2025, *m, 1), &cfg))
            .collect();
        assert_eq!(got, vec![28.0, 28.0, 24.0, 20.0, 20.0, 18.0, 18.0, 16.0, 16.0]);
    }

    #[test]
    fn outcome_table() {
        assert_eq!(outcome_score(true, FinishKind::Regulation), 1.0);
        assert_eq!(outcome_score(false, FinishKind::Regulation), 0.0);
        assert_eq!(outcome_score(true, FinishKind::Overtime), 0.85);
        assert!((outcome_score(false, FinishKind::Overtime) - 0.15).abs() < 1e-12);
        assert_eq!(outcome_score(true, FinishKind::Shootout), 0.75);
        assert_eq!(outcome_score(false, FinishKind::Shootout), 0.25);
    }
}
