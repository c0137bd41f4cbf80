//! Coordinate reference systems of planetary bodies.

/// The geographic coordinate reference system of Mars, IAU 2000, in WKT.
///
/// Tables built from OGC services carry this as their crs.
pub const MARS_2000: &str = r#"GEOGCS["Mars 2000",DATUM["D_Mars_2000",SPHEROID["Mars_2000_IAU_IAG",3396190.0,169.89444722361179]],PRIMEM["Greenwich",0],UNIT["Decimal_Degree",0.0174532925199433]]"#;
