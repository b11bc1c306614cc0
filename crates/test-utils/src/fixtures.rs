//! Upstream directory listing fixtures.

/// File names in the order the upstream index lists them.
pub const SAMPLE_FILES: [&str; 3] = [
    "MRMS_ReflectivityAtLowestAltitude_00.50_20240101-000000.grib2.gz",
    "MRMS_ReflectivityAtLowestAltitude_00.50_20240101-000200.grib2.gz",
    "MRMS_ReflectivityAtLowestAltitude_00.50_20240101-000400.grib2.gz",
];

/// The name a correct selector picks from [`SAMPLE_FILES`].
pub const SAMPLE_LATEST: &str =
    "MRMS_ReflectivityAtLowestAltitude_00.50_20240101-000400.grib2.gz";

/// An Apache-style autoindex page linking `files`.
///
/// Includes the usual sort links, a parent directory link and the
/// `.latest` alias so parsers are exercised against realistic noise.
pub fn listing_html(files: &[&str]) -> String {
    let mut html = String::from(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
         <html>\n <head>\n  <title>Index of /2D/ReflectivityAtLowestAltitude</title>\n </head>\n <body>\n\
         <h1>Index of /2D/ReflectivityAtLowestAltitude</h1>\n\
         <table>\n\
         <tr><th><a href=\"?C=N;O=D\">Name</a></th><th><a href=\"?C=M;O=A\">Last modified</a></th><th><a href=\"?C=S;O=A\">Size</a></th></tr>\n\
         <tr><td><a href=\"/2D/\">Parent Directory</a></td><td>&nbsp;</td><td>-</td></tr>\n",
    );

    for name in files {
        html.push_str(&format!(
            "<tr><td><a href=\"{name}\">{name}</a></td><td align=\"right\">2024-01-01 00:02  </td><td align=\"right\">412K</td></tr>\n"
        ));
    }

    html.push_str(
        "<tr><td><a href=\"MRMS_ReflectivityAtLowestAltitude.latest.grib2.gz.idx\">MRMS_ReflectivityAtLowestAltitude.latest.grib2.gz.idx</a></td></tr>\n\
         </table>\n</body></html>\n",
    );
    html
}
