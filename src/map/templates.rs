use serde_json::json;

use crate::config::Config;
use crate::map::backend::EXTENSION_METERS;
use crate::map::host::{FULL_VIEWPORT, OSM_TILES};
use crate::map::marker::POLYGON_COLOR;

/// Render the map page. The body only holds an empty mount point; Leaflet
/// builds the map once the script runs in the browser.
pub fn render_map_page(config: &Config) -> String {
    let settings = json!({
        "center": [FULL_VIEWPORT.center.lat, FULL_VIEWPORT.center.lon],
        "zoom": FULL_VIEWPORT.zoom,
        "tiles": OSM_TILES.url_template,
        "subdomains": OSM_TILES.subdomains,
        "attribution": format!(
            r#"&copy; <a href="{}">OpenStreetMap</a> contributors"#,
            OSM_TILES.attribution_url
        ),
        "nominatim": config.nominatim_url.trim_end_matches('/'),
        "apiBase": config.api_base.trim_end_matches('/'),
        "extensionMeters": EXTENSION_METERS,
        "polygonColor": POLYGON_COLOR,
    });

    let content = MAP_SCRIPT.replace("__SETTINGS__", &script_safe_json(&settings));
    build_page("Map", &content)
}

/// JSON that can sit inside a `<script>` element: `</` would let a value
/// close the element early.
fn script_safe_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

const MAP_SCRIPT: &str = r#"
<div id="map"></div>
<div id="panel" hidden></div>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script>
const SETTINGS = __SETTINGS__;

const map = L.map('map').setView(SETTINGS.center, SETTINGS.zoom);
L.tileLayer(SETTINGS.tiles, {
    attribution: SETTINGS.attribution,
    subdomains: SETTINGS.subdomains,
}).addTo(map);

const panel = document.getElementById('panel');
let generation = 0;
let inflight = null;
let located = null;
let lastError = null;
let polygon = null;

function clearPolygon() {
    if (polygon) { map.removeLayer(polygon); polygon = null; }
}

function supersede() {
    generation += 1;
    if (inflight) inflight.abort();
    inflight = new AbortController();
    return { mine: generation, signal: inflight.signal };
}

async function getJson(url, signal) {
    const r = await fetch(url, { signal });
    if (!r.ok) throw new Error(`HTTP ${r.status} from ${url}`);
    return r.json();
}

function renderPanel() {
    if (!located && !lastError) { panel.hidden = true; return; }
    panel.replaceChildren();
    if (located) {
        const address = document.createElement('p');
        address.className = 'address';
        address.textContent = located.address;
        panel.append(address);
    }
    if (located && located.wayId !== null) {
        const way = document.createElement('p');
        way.textContent = `Way ID: ${located.wayId}`;
        panel.append(way);
    }
    if (lastError) {
        const err = document.createElement('p');
        err.className = 'error';
        err.textContent = `Lookup failed: ${lastError}`;
        panel.append(err);
    }
    if (!located) { panel.hidden = false; return; }
    const button = document.createElement('button');
    button.textContent = 'Confirm accident';
    button.disabled = located.wayId === null || located.generation !== generation;
    button.addEventListener('click', confirmAccident);
    panel.append(button);
    panel.hidden = false;
}

map.on('click', async (e) => {
    clearPolygon();
    const { mine, signal } = supersede();
    const { lat, lng } = e.latlng;
    try {
        const data = await getJson(
            `${SETTINGS.nominatim}/reverse?format=jsonv2&lat=${lat}&lon=${lng}`, signal);
        if (mine !== generation) return;
        if (typeof data.display_name !== 'string') throw new Error('missing display_name');
        located = {
            address: data.display_name,
            wayId: data.osm_type === 'way' ? data.osm_id : null,
            generation: mine,
        };
        lastError = null;
    } catch (err) {
        if (err.name === 'AbortError' || mine !== generation) return;
        lastError = err.message;
    }
    renderPanel();
});

async function confirmAccident() {
    if (!located || located.wayId === null || located.generation !== generation) return;
    const mine = generation;
    const signal = inflight ? inflight.signal : undefined;
    const url = `${SETTINGS.apiBase}/api/v1/accidents/accident_area`
        + `?way_id=${located.wayId}&extension_meters=${SETTINGS.extensionMeters}`;
    try {
        const points = await getJson(url, signal);
        if (mine !== generation) return;
        clearPolygon();
        polygon = L.polygon(points, { color: SETTINGS.polygonColor }).addTo(map);
    } catch (err) {
        if (err.name !== 'AbortError') console.error('Failed to load accident area', err);
    }
}
</script>
"#;

fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Accident Area</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
<style>
*{{margin:0;padding:0;box-sizing:border-box;}}
body{{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;}}
#map{{height:{height};width:{width};}}
#panel{{position:absolute;top:16px;right:16px;z-index:1000;background:#fff;padding:12px 16px;border-radius:8px;box-shadow:0 2px 8px rgba(0,0,0,.2);max-width:320px;font-size:14px;}}
#panel p{{margin-bottom:6px;}}
#panel .address{{font-weight:600;}}
#panel .error{{color:#c62828;font-size:12px;}}
#panel button{{padding:6px 16px;background:#c62828;color:#fff;border:none;border-radius:4px;cursor:pointer;}}
#panel button:disabled{{background:#bbb;cursor:not-allowed;}}
</style>
</head>
<body>
{content}
</body>
</html>"#,
        height = FULL_VIEWPORT.height,
        width = FULL_VIEWPORT.width,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_cannot_close_the_script() {
        let config = Config {
            api_base: "http://evil.example/</script><script>alert(1)</script>".to_string(),
            ..Config::default()
        };
        let page = render_map_page(&config);

        assert_eq!(page.matches("</script>").count(), 2);
        assert!(page.contains(r"http://evil.example/<\/script><script>alert(1)<\/script>"));
    }

    #[test]
    fn settings_remain_valid_json() {
        let value = json!({ "apiBase": "a</b" });
        let escaped = script_safe_json(&value);
        let parsed: serde_json::Value = serde_json::from_str(&escaped).unwrap();
        assert_eq!(parsed, value);
    }
}
