/// Index page embedding the live stream
pub fn index_html(stream_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>seesay</title>
<style>
body {{ margin: 0; display: flex; flex-direction: column; align-items: center; font-family: sans-serif; background: #d1d0ec; }}
h1 {{ color: #333; }}
#video-feed {{ max-width: 100%; border: 2px solid #4caf50; border-radius: 8px; }}
</style>
</head>
<body>
<h1>seesay</h1>
<img id="video-feed" src="{src}" alt="Live camera stream">
<p><a href="/stats">stats</a></p>
</body>
</html>
"#,
        src = escape_attr(stream_path)
    )
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
