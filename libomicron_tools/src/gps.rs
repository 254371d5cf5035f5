use time::macros::format_description;
use time::OffsetDateTime;

/// Unix time of the GPS epoch, 1980-01-06 00:00:00 UTC
const GPS_EPOCH_UNIX: i64 = 315_964_800;

/// Unix times at which each leap second since the GPS epoch took effect.
/// Append new entries as IERS Bulletin C announces them.
const LEAP_SECONDS_UNIX: [i64; 18] = [
    362_793_600,   // 1981-07-01
    394_329_600,   // 1982-07-01
    425_865_600,   // 1983-07-01
    489_024_000,   // 1985-07-01
    567_993_600,   // 1988-01-01
    631_152_000,   // 1990-01-01
    662_688_000,   // 1991-01-01
    709_948_800,   // 1992-07-01
    741_484_800,   // 1993-07-01
    773_020_800,   // 1994-07-01
    820_454_400,   // 1996-01-01
    867_715_200,   // 1997-07-01
    915_148_800,   // 1999-01-01
    1_136_073_600, // 2006-01-01
    1_230_768_000, // 2009-01-01
    1_341_100_800, // 2012-07-01
    1_435_708_800, // 2015-07-01
    1_483_228_800, // 2017-01-01
];

/// Number of leap seconds between GPS and UTC at a Unix time
pub fn leap_seconds_at_unix(unix: i64) -> i64 {
    LEAP_SECONDS_UNIX.iter().filter(|&&leap| unix >= leap).count() as i64
}

/// Number of leap seconds between GPS and UTC at a GPS time
fn leap_seconds_at_gps(gps: i64) -> i64 {
    LEAP_SECONDS_UNIX
        .iter()
        .enumerate()
        .filter(|&(index, &leap)| gps >= leap - GPS_EPOCH_UNIX + index as i64 + 1)
        .count() as i64
}

pub fn unix_to_gps(unix: i64) -> f64 {
    (unix - GPS_EPOCH_UNIX + leap_seconds_at_unix(unix)) as f64
}

pub fn gps_to_unix(gps: f64) -> i64 {
    let gps = gps.floor() as i64;
    gps + GPS_EPOCH_UNIX - leap_seconds_at_gps(gps)
}

pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// The current GPS time in whole seconds
pub fn gps_now() -> f64 {
    unix_to_gps(unix_now())
}

/// Human readable UTC form of a GPS time, used on the dashboard
pub fn gps_to_utc_string(gps: f64) -> String {
    OffsetDateTime::from_unix_timestamp(gps_to_unix(gps))
        .ok()
        .and_then(|datetime| {
            datetime
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second] UTC"
                ))
                .ok()
        })
        .unwrap_or_else(|| format!("GPS {gps}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        // 2017-08-17 12:41:04 UTC (GW170817)
        assert_eq!(unix_to_gps(1502973664), 1187008882.0);
        assert_eq!(gps_to_unix(1187008882.4), 1502973664);
        assert_eq!(gps_to_utc_string(1187008882.0), "2017-08-17 12:41:04 UTC");
    }

    #[test]
    fn test_leap_seconds() {
        assert_eq!(leap_seconds_at_unix(GPS_EPOCH_UNIX), 0);
        assert_eq!(unix_to_gps(GPS_EPOCH_UNIX), 0.0);
        // 1992-03-07, after the 1991 leap second and before the 1992 one
        assert_eq!(leap_seconds_at_unix(700_000_000), 7);
        assert_eq!(unix_to_gps(700_000_000), 384_035_207.0);
        assert_eq!(gps_to_unix(384_035_207.0), 700_000_000);
        // Either side of the 2017-01-01 leap second
        assert_eq!(leap_seconds_at_unix(1_483_228_799), 17);
        assert_eq!(leap_seconds_at_unix(1_483_228_800), 18);
        assert_eq!(gps_to_unix(unix_to_gps(1_483_228_800)), 1_483_228_800);
        assert_eq!(gps_to_unix(unix_to_gps(1_483_228_799)), 1_483_228_799);
    }
}
