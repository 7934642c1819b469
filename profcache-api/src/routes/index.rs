//! Index page with the lookup form.

use axum::response::{Html, IntoResponse};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Profile lookup</title>
<style>
body{font-family:sans-serif;max-width:40em;margin:2em auto;padding:0 1em}
button{margin-right:.5em}
#result{color:#b00020;white-space:pre-wrap}
</style>
</head>
<body>
<h1>Profile lookup</h1>
<form id="fetch-form">
  <label>Profile id <input id="key" name="key" required pattern="[A-Za-z0-9_\-][A-Za-z0-9._\-]*" maxlength="100"></label>
  <label><input type="checkbox" id="use-cache" checked> Use cache</label>
  <button type="submit">Fetch</button>
</form>
<p id="progress"></p>
<p id="result"></p>
<div>
  <button id="raw-data" disabled>Raw data</button>
  <button id="download-json" disabled>Download JSON</button>
  <button id="view-web" disabled>Web view</button>
</div>
<script>
const form = document.getElementById("fetch-form");
const buttons = {
  "raw-data": "raw",
  "download-json": "download",
  "view-web": "web-view",
};
form.addEventListener("submit", async (event) => {
  event.preventDefault();
  const key = encodeURIComponent(document.getElementById("key").value);
  const useCache = document.getElementById("use-cache").checked;
  const progress = document.getElementById("progress");
  const result = document.getElementById("result");
  progress.textContent = "Fetching data...";
  result.textContent = "";
  for (const id of Object.keys(buttons)) {
    document.getElementById(id).disabled = true;
  }
  try {
    const response = await fetch(`/fetchdata/${key}/raw?cache=${useCache}`);
    const data = await response.json();
    if (!response.ok) {
      progress.textContent = "Error fetching data!";
      result.textContent = data.error || response.statusText;
      return;
    }
    progress.textContent = `Data fetched (${response.headers.get("x-cache") || "MISS"}).`;
    for (const [id, action] of Object.entries(buttons)) {
      const button = document.getElementById(id);
      button.disabled = false;
      button.onclick = () => window.open(`/fetchdata/${key}/${action}`, "_blank");
    }
  } catch (error) {
    progress.textContent = "Error fetching data!";
    result.textContent = error.toString();
  }
});
</script>
</body>
</html>
"#;

/// GET /
pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}
