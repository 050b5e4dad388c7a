//! The single page served at `/`. Kept as a `&'static str` so the binary
//! needs nothing but its config and data files.

/// Render the page with the configured title.
pub fn index_page(title: &str) -> String {
    INDEX_HTML.replace("{{title}}", &escape(title))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{title}}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  body { font-family: sans-serif; margin: 0; }
  .block-container { max-width: 1024px; margin: 0 auto; padding: 1rem; }
  h2 { text-align: center; }
  .columns { display: flex; gap: 1rem; }
  .columns label { flex: 1; display: flex; flex-direction: column; font-size: 0.9rem; }
  .columns select { margin-top: 0.3rem; padding: 0.3rem; }
  #map { width: 100%; height: 400px; margin-top: 1rem; }
  .notice { padding: 0.5rem 0.8rem; margin: 0.5rem 0; border-radius: 4px; }
  .notice.info { background: #e8f0fe; }
  .notice.warning { background: #fff4e5; }
  .notice.error { background: #fdecea; }
</style>
</head>
<body>
<div class="block-container">
  <h2>{{title}}</h2>
  <p>This app allows you to select a location in the Democratic Republic of the Congo and visualize it on a map. You can also overlay additional layers such as health facilities and ports.</p>

  <div class="columns">
    <label>Select Admin Level 1 (Province):<select id="admin1"></select></label>
    <label>Select Admin Level 2 (District):<select id="admin2"></select></label>
    <label>Select Admin Level 3 (Town):<select id="admin3"></select></label>
  </div>

  <p id="caption"></p>
  <div id="notices"></div>

  <p><b>Layers</b></p>
  <p>Select the layers you want to display on the map. Since the data is loaded from CSV files, it may take a few seconds for the layers to fully load and appear correctly.</p>
  <label><input type="checkbox" id="hospitals"> Show Health Facilities Layer</label><br>
  <label><input type="checkbox" id="ports"> Show Ports Layer</label>

  <div id="map"></div>
</div>
<script>
const map = L.map('map');
let tiles = null;
let drawn = L.layerGroup().addTo(map);
let control = null;

function fill(select, options, value) {
  select.innerHTML = '';
  for (const option of options) {
    const el = document.createElement('option');
    el.value = option;
    el.textContent = option;
    select.appendChild(el);
  }
  if (value !== null) select.value = value;
}

function marker(m) {
  const layer = m.color
    ? L.circleMarker([m.lat, m.lon], { radius: 7, color: m.color, fillColor: m.color, fillOpacity: 0.8 })
    : L.marker([m.lat, m.lon]);
  return layer.bindPopup(m.popup);
}

function draw(view) {
  if (!tiles) {
    tiles = L.tileLayer(view.tiles.url, { attribution: view.tiles.attribution }).addTo(map);
  }
  map.setView(view.center, view.zoom);

  drawn.clearLayers();
  if (control) { map.removeControl(control); control = null; }

  for (const m of view.markers) drawn.addLayer(marker(m));

  const overlays = {};
  for (const layer of view.layers) {
    let group;
    if (layer.type === 'boundary') {
      group = L.geoJSON(layer.data, { style: () => layer.style });
    } else {
      group = L.featureGroup(layer.markers.map(marker));
    }
    drawn.addLayer(group);
    overlays[layer.name] = group;
  }
  if (view.layer_control) control = L.control.layers({}, overlays).addTo(map);

  document.getElementById('caption').textContent = view.caption;
  const notices = document.getElementById('notices');
  notices.innerHTML = '';
  for (const n of view.notices) {
    const el = document.createElement('div');
    el.className = 'notice ' + n.level;
    el.textContent = n.text;
    notices.appendChild(el);
  }
}

async function refresh() {
  const params = new URLSearchParams();
  for (const id of ['admin1', 'admin2', 'admin3']) {
    const value = document.getElementById(id).value;
    if (value) params.set(id, value);
  }
  params.set('hospitals', document.getElementById('hospitals').checked);
  params.set('ports', document.getElementById('ports').checked);

  const response = await fetch('/api/view?' + params);
  if (!response.ok) {
    document.getElementById('notices').textContent = await response.text();
    return;
  }
  const body = await response.json();
  const s = body.selection;
  fill(document.getElementById('admin1'), s.admin1_options, s.admin1);
  fill(document.getElementById('admin2'), s.admin2_options, s.admin2);
  fill(document.getElementById('admin3'), s.admin3_options, s.admin3);
  draw(body.map);
}

for (const id of ['admin1', 'admin2', 'admin3', 'hospitals', 'ports']) {
  document.getElementById(id).addEventListener('change', refresh);
}
refresh();
</script>
</body>
</html>
"#;
