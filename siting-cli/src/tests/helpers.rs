//! Upload fixtures shared by the CLI tests.

use std::fs;

use camino::Utf8Path;

const HEADER: &str = "site_id,site_name,latitude,longitude,area_sqm,solar_irradiance_kwh,\
grid_distance_km,slope_degrees,road_distance_km,elevation_m,land_type,region";

const ROWS: [&str; 3] = [
    "1,Bhadla North,27.53,71.91,60000,6.2,1.5,2.0,0.4,220,Wasteland,Rajasthan",
    "2,Pavagada East,14.10,77.28,12345,4.1,7.3,16.2,1.9,650,Agricultural,Karnataka",
    "3,Charanka South,23.90,71.20,30000,5.0,3.0,8.0,1.0,80,Wasteland,Gujarat",
];

/// Write the three-site upload, applying `edit` to each data row first.
pub(super) fn write_upload(path: &Utf8Path, edit: impl Fn(&str) -> String) {
    let mut body = String::from(HEADER);
    for row in ROWS {
        body.push('\n');
        body.push_str(&edit(row));
    }
    body.push('\n');
    fs::write(path, body).expect("write upload");
}
