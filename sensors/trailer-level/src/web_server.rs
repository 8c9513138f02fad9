use std::sync::Arc;

use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::io::{EspIOError, Read, Write};
use log::{info, warn};
use serde::Serialize;

use crate::diagnostics::DiagnosticsState;
use crate::report::{DashboardReport, OrientationReply, OrientationRequest};
use crate::system::{self, SharedDevice};

/// Largest accepted request body
const MAX_BODY_LEN: usize = 256;

/// HTTP front end: dashboard page, snapshot polling and calibration commands
pub struct LevelServer {
    _server: EspHttpServer<'static>,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!("JSON encode failed: {}", e);
        "{}".to_string()
    })
}

fn send_json(
    req: Request<&mut EspHttpConnection<'_>>,
    status: u16,
    json: &str,
) -> Result<(), EspIOError> {
    let content_length = json.len().to_string();
    let mut response = req.into_response(
        status,
        None,
        &[
            ("Content-Type", "application/json"),
            ("Content-Length", &content_length),
            ("Access-Control-Allow-Origin", "*"),
            ("Cache-Control", "no-cache"),
        ],
    )?;
    response.write_all(json.as_bytes())?;
    Ok(())
}

/// Read up to `MAX_BODY_LEN` bytes of the request body
fn read_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> Result<Vec<u8>, EspIOError> {
    let mut body = vec![0u8; MAX_BODY_LEN];
    let mut len = 0;
    while len < body.len() {
        let n = req.read(&mut body[len..])?;
        if n == 0 {
            break;
        }
        len += n;
    }
    body.truncate(len);
    Ok(body)
}

/// Accepts `{"forward_hint":"+X"}` or a bare token
fn parse_hint_body(body: &[u8]) -> String {
    match serde_json::from_slice::<OrientationRequest>(body) {
        Ok(req) => req.forward_hint,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

impl LevelServer {
    pub fn new(
        port: u16,
        device: SharedDevice,
        diagnostics: Arc<DiagnosticsState>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Starting HTTP server on port {}", port);

        let server_config = Configuration {
            http_port: port,
            max_uri_handlers: 10,
            max_open_sockets: 6,
            stack_size: 10240,
            ..Default::default()
        };

        let mut server = EspHttpServer::new(&server_config)?;

        server.fn_handler(
            "/",
            esp_idf_svc::http::Method::Get,
            |req| -> Result<(), EspIOError> {
                let html_bytes = DASHBOARD_HTML.as_bytes();
                let content_length = html_bytes.len().to_string();
                let mut response = req.into_response(
                    200,
                    None,
                    &[
                        ("Content-Type", "text/html; charset=utf-8"),
                        ("Content-Length", &content_length),
                        ("Connection", "close"),
                    ],
                )?;
                response.write_all(html_bytes)?;
                Ok(())
            },
        )?;

        // Dashboard polling, flat field names
        let dev = device.clone();
        server.fn_handler(
            "/sensor",
            esp_idf_svc::http::Method::Get,
            move |req| -> Result<(), EspIOError> {
                let snap = system::lock(&dev).engine().snapshot();
                send_json(req, 200, &to_json(&DashboardReport::from(&snap)))
            },
        )?;

        // Full snapshot, nested as the engine reports it
        let dev = device.clone();
        server.fn_handler(
            "/api/snapshot",
            esp_idf_svc::http::Method::Get,
            move |req| -> Result<(), EspIOError> {
                let snap = system::lock(&dev).engine().snapshot();
                send_json(req, 200, &to_json(&snap))
            },
        )?;

        let dev = device.clone();
        server.fn_handler(
            "/calibrate",
            esp_idf_svc::http::Method::Post,
            move |req| -> Result<(), EspIOError> {
                let outcome = system::lock(&dev).recalibrate();
                info!(
                    "Calibrated via HTTP: hint {}, |g| {:.3}",
                    outcome.hint, outcome.gravity_magnitude
                );
                let reply = OrientationReply {
                    ok: true,
                    forward_hint: outcome.hint,
                    gravity_magnitude: Some(outcome.gravity_magnitude),
                    error: None,
                };
                send_json(req, 200, &to_json(&reply))
            },
        )?;

        let dev = device.clone();
        server.fn_handler(
            "/orientation",
            esp_idf_svc::http::Method::Get,
            move |req| -> Result<(), EspIOError> {
                let hint = system::lock(&dev).engine().hint();
                let reply = OrientationReply {
                    ok: true,
                    forward_hint: hint,
                    gravity_magnitude: None,
                    error: None,
                };
                send_json(req, 200, &to_json(&reply))
            },
        )?;

        let dev = device.clone();
        server.fn_handler(
            "/orientation",
            esp_idf_svc::http::Method::Post,
            move |mut req| -> Result<(), EspIOError> {
                let body = read_body(&mut req)?;
                let token = parse_hint_body(&body);

                let mut device = system::lock(&dev);
                let (status, reply) = match device.set_forward_hint(&token) {
                    Ok(hint) => (
                        200,
                        OrientationReply {
                            ok: true,
                            forward_hint: hint,
                            gravity_magnitude: None,
                            error: None,
                        },
                    ),
                    Err(e) => {
                        warn!("Rejected forward hint: {}", e);
                        (
                            400,
                            OrientationReply {
                                ok: false,
                                forward_hint: device.engine().hint(),
                                gravity_magnitude: None,
                                error: Some(e.to_string()),
                            },
                        )
                    }
                };
                drop(device);

                send_json(req, status, &to_json(&reply))
            },
        )?;

        let dev = device.clone();
        server.fn_handler(
            "/peaks/reset",
            esp_idf_svc::http::Method::Post,
            move |req| -> Result<(), EspIOError> {
                system::lock(&dev).reset_peaks();
                send_json(req, 200, r#"{"ok":true}"#)
            },
        )?;

        server.fn_handler(
            "/api/diagnostics",
            esp_idf_svc::http::Method::Get,
            move |req| -> Result<(), EspIOError> {
                send_json(req, 200, &to_json(&diagnostics.snapshot()))
            },
        )?;

        info!("HTTP server ready on port {}", port);
        Ok(Self { _server: server })
    }
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Trailer Level</title>
<style>
body{font-family:system-ui,sans-serif;margin:0;padding:16px;background:#111;color:#eee}
h1{font-size:18px;margin:0 0 12px}
.row{display:flex;gap:12px;flex-wrap:wrap}
.card{flex:1;min-width:140px;background:#1c1c1e;border-radius:12px;padding:12px}
.big{font-size:40px;font-weight:700;font-variant-numeric:tabular-nums}
.lbl{font-size:12px;color:#999;text-transform:uppercase}
.quad{font-size:13px;font-variant-numeric:tabular-nums;color:#ccc}
button,select{font:inherit;padding:10px 14px;border-radius:10px;border:none;margin:4px 4px 0 0}
button{background:#0a84ff;color:#fff}
#status{font-size:12px;color:#999;margin-top:8px}
</style></head><body>
<h1>Trailer Level</h1>
<div class="row">
 <div class="card"><div class="lbl">Pitch</div><div class="big" id="pitch">--</div></div>
 <div class="card"><div class="lbl">Roll</div><div class="big" id="roll">--</div></div>
</div>
<div class="row" style="margin-top:12px">
 <div class="card"><div class="lbl">Accel f/r/u (g)</div><div class="quad" id="accel"></div><div class="quad" id="apeak"></div></div>
 <div class="card"><div class="lbl">Rate pitch/roll/turn (&deg;/s)</div><div class="quad" id="gyro"></div><div class="quad" id="rpeak"></div></div>
</div>
<div style="margin-top:12px">
 <button id="cal">Calibrate level</button>
 <button id="rst">Reset peaks</button>
 <select id="sel-forward"><option>+X</option><option>-X</option><option>+Y</option><option>-Y</option></select>
</div>
<div id="status">connecting</div>
<script>
const $=s=>document.querySelector(s);const st=$("#status");
const f=(v,n)=>(+(v||0)).toFixed(n);
const q=p=>`peak &uarr;${f(p.up,2)} &darr;${f(p.down,2)} &larr;${f(p.left,2)} &rarr;${f(p.right,2)}`;
async function poll(){
 try{const r=await fetch("/sensor",{cache:"no-store"});const d=await r.json();
  $("#pitch").textContent=f(d.pos_pitch_avg,1)+"°";$("#roll").textContent=f(d.pos_roll_avg,1)+"°";
  $("#accel").textContent=`${f(d.accel_forward,2)} / ${f(d.accel_right,2)} / ${f(d.accel_up,2)}`;
  $("#apeak").innerHTML=q(d.accel_peak||{});
  $("#gyro").textContent=`${f(d.gyro_pitchup-d.gyro_pitchdown,1)} / ${f(d.gyro_rollright-d.gyro_rollleft,1)} / ${f(d.gyro_turnright-d.gyro_turnleft,1)}`;
  $("#rpeak").innerHTML=q(d.roll_peak||{});
  st.textContent=d.calibrated?"ok":"uncalibrated";
 }catch(e){st.textContent="offline"}
 setTimeout(poll,200);
}
$("#cal").onclick=async()=>{st.textContent="calibrating";const r=await fetch("/calibrate",{method:"POST"});st.textContent=r.ok?"calibrated":"error"};
$("#rst").onclick=()=>fetch("/peaks/reset",{method:"POST"});
$("#sel-forward").onchange=async e=>{
 const r=await fetch("/orientation",{method:"POST",headers:{"Content-Type":"application/json"},body:JSON.stringify({forward_hint:e.target.value})});
 st.textContent=r.ok?"forward set":"rejected"};
fetch("/orientation").then(r=>r.json()).then(o=>{if(o.forward_hint)$("#sel-forward").value=o.forward_hint}).catch(()=>{});
poll();
</script></body></html>
"#;
