//! Shared sample fixture for feature tests.

use std::sync::OnceLock;

use jovial_syntax::session::{analyze, AnalysisSnapshot};
use jovial_syntax::span::Position;

/// A small but representative flight-control program: apostrophe
/// identifiers, a documented declaration, a status enumeration, a table
/// block and a procedure with input/output parameters. Analyzes without
/// diagnostics.
const SAMPLE_SOURCE: &str = "START FLIGHT'CONTROL;

DEFINE MAX'ALTITUDE = 50000;

\" Altitude above sea level, in feet \"
ITEM ALTITUDE STATIC S 16;
ITEM AIRSPEED F 32;
ITEM HEADING U 9;
ITEM STATUS'FLAG STATUS (V(NORMAL), V(WARNING), V(CRITICAL));
ITEM PILOT'NAME C 30;

TABLE WAYPOINTS (1:100);
BEGIN
    ITEM LAT F 32;
    ITEM LON F 32;
    ITEM ALT S 16;
END

PROC UPDATE'POSITION (NEW'LAT, NEW'LON : DISTANCE);
BEGIN
    ITEM NEW'LAT F 32;
    ITEM NEW'LON F 32;
    ITEM DISTANCE F 32;
    IF DISTANCE > MAX'ALTITUDE THEN RETURN;
    ALTITUDE := ALTITUDE + 1;
END

ALTITUDE := 0;
STATUS'FLAG := V(NORMAL);
UPDATE'POSITION (1, 2);

TERM
";

static SAMPLE_SNAPSHOT: OnceLock<AnalysisSnapshot> = OnceLock::new();

pub fn sample_source() -> &'static str {
    SAMPLE_SOURCE
}

pub fn sample_snapshot() -> AnalysisSnapshot {
    SAMPLE_SNAPSHOT
        .get_or_init(|| analyze(SAMPLE_SOURCE, 1))
        .clone()
}

/// Position of the first byte of `needle` in the sample source.
pub fn position_of(needle: &str) -> Position {
    position_in(SAMPLE_SOURCE, needle)
}

/// Position of the first byte of `needle` in `source`.
pub fn position_in(source: &str, needle: &str) -> Position {
    let offset = source
        .find(needle)
        .unwrap_or_else(|| panic!("needle not found: {needle}"));
    let mut line = 0;
    let mut column = 0;
    for ch in source[..offset].chars() {
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += ch.len_utf8();
        }
    }
    Position::new(line, column)
}
