//! Viewer module - generates HTML pages for viewing artworks with OpenSeadragon.

use crate::gallery::ArtworkRecord;
use crate::pyramid::PyramidDescriptor;

/// Escape text for use in HTML content and attribute values.
fn html_escape(s: &str) -> String {
    s.chars().fold(String::with_capacity(s.len()), |mut out, c| {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
        out
    })
}

/// Generate an HTML page with an OpenSeadragon viewer for one artwork.
///
/// The viewer loads the `.dzi` descriptor from the static file tree and
/// derives every tile URL from it, exactly as any other Deep Zoom client.
pub fn generate_viewer_html(record: &ArtworkRecord, descriptor: &PyramidDescriptor) -> String {
    let title = html_escape(&record.display_name);
    let format = html_escape(&descriptor.format);
    let descriptor_url = format!("/{}", html_escape(&record.descriptor_path));

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<script src="https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon.min.js"></script>
<style>
  html, body {{ margin: 0; height: 100%; background: #1b1a18; color: #eae6df; }}
  body {{ display: flex; flex-direction: column; font-family: Georgia, 'Times New Roman', serif; }}
  #canvas {{ flex: 1; min-height: 0; }}
  figcaption {{
    display: flex; align-items: baseline; gap: 1.5em;
    padding: 10px 18px; border-top: 1px solid #3a3833; font-size: 14px;
  }}
  figcaption h1 {{ margin: 0; font-size: 17px; font-weight: normal; font-style: italic; }}
  figcaption .details {{ color: #a39e94; font-size: 12px; letter-spacing: 0.02em; }}
  figcaption a {{ margin-left: auto; color: #d4b072; text-decoration: none; }}
  #load-error {{ display: none; padding: 8px 18px; background: #7f1d1d; font-size: 13px; }}
</style>
</head>
<body>
<div id="load-error">Some tiles could not be loaded. Reload the page to try again.</div>
<div id="canvas"></div>
<figcaption>
  <h1>{title}</h1>
  <span class="details">{width} &times; {height} px &middot; {level_count} levels &middot; {tile_size} px {format} tiles</span>
  <a href="/api/artworks">All artworks</a>
</figcaption>
<script>
  var viewer = OpenSeadragon({{
    id: "canvas",
    prefixUrl: "https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon/images/",
    tileSources: "{descriptor_url}",
    showNavigator: true,
    navigatorPosition: "TOP_RIGHT",
    maxZoomPixelRatio: 3,
    visibilityRatio: 1,
    gestureSettingsMouse: {{ clickToZoom: false }}
  }});
  viewer.addHandler("tile-load-failed", function () {{
    document.getElementById("load-error").style.display = "block";
  }});
  document.addEventListener("keydown", function (event) {{
    if (event.key === "f") {{
      viewer.setFullScreen(!viewer.isFullPage());
    }}
  }});
</script>
</body>
</html>"##,
        width = descriptor.width,
        height = descriptor.height,
        level_count = descriptor.level_count(),
        tile_size = descriptor.tile_size,
    )
}
