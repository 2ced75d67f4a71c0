// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP-backed spooler gateway.
//
// Wraps the `ipp` crate's async client behind the synchronous
// `SpoolerGateway` trait: the gateway owns a private current-thread Tokio
// runtime and blocks on each operation.  Operations used:
//   - Get-Printer-Attributes  (RFC 8011 §4.2.5) for enumerate/attributes
//   - Print-Job               (RFC 8011 §4.2.1) for submit
//   - Cancel-Job              (RFC 8011 §4.2.8) for cancel

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use ipp::prelude::*;
use tracing::{debug, info, instrument, warn};

use plotforge_core::error::{PlotforgeError, Result};
use plotforge_core::types::{DeviceRecord, PrintOptions};

use crate::spooler::SpoolerGateway;

/// Flattened Get-Printer-Attributes response: attribute name → display
/// value.  Multi-valued attributes are joined with `", "`.
type AttributeMap = HashMap<String, String>;

/// Spooler gateway speaking IPP directly to a configured set of printers.
pub struct IppGateway {
    /// Endpoint URIs this gateway serves (from `spooler.printers`).
    printers: Vec<String>,
    runtime: tokio::runtime::Runtime,
    /// Spooler id → printer URI, for Cancel-Job routing.
    job_index: Mutex<HashMap<i64, String>>,
}

impl IppGateway {
    /// Build a gateway for the configured printer endpoints.
    pub fn new(printers: Vec<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            printers,
            runtime,
            job_index: Mutex::new(HashMap::new()),
        })
    }

    fn parse_uri(uri: &str) -> Result<Uri> {
        uri.parse()
            .map_err(|e| PlotforgeError::IppRequest(format!("invalid URI '{uri}': {e}")))
    }

    /// Send Get-Printer-Attributes and flatten the response.
    #[instrument(skip(self), fields(uri = %uri))]
    fn query_attributes(&self, uri: &str) -> Result<AttributeMap> {
        let parsed = Self::parse_uri(uri)?;
        let operation = IppOperationBuilder::get_printer_attributes(parsed.clone()).build();
        let client = AsyncIppClient::new(parsed);

        debug!("sending Get-Printer-Attributes");
        let response = self
            .runtime
            .block_on(client.send(operation))
            .map_err(|e| PlotforgeError::IppRequest(format!("Get-Printer-Attributes: {e}")))?;

        if !response.header().status_code().is_success() {
            let code = response.header().status_code();
            return Err(PlotforgeError::IppRequest(format!(
                "Get-Printer-Attributes returned status {code:?}"
            )));
        }

        let attrs = flatten_attributes(response.attributes());
        debug!(count = attrs.len(), "received printer attributes");
        Ok(attrs)
    }
}

impl SpoolerGateway for IppGateway {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>> {
        let mut devices = Vec::with_capacity(self.printers.len());
        for uri in &self.printers {
            match self.printer_attributes(uri) {
                Ok(record) => devices.push(record),
                Err(e) => {
                    // Unreachable endpoints are still part of the fleet;
                    // report them stopped rather than hiding them.
                    warn!(uri = %uri, error = %e, "endpoint did not answer attribute query");
                    devices.push(DeviceRecord::unknown(uri.clone()));
                }
            }
        }
        info!(count = devices.len(), "enumerated configured printers");
        Ok(devices)
    }

    #[instrument(skip(self, path, options), fields(uri = %printer_uri))]
    fn submit(&self, printer_uri: &str, path: &Path, options: &PrintOptions) -> Result<i64> {
        let document = std::fs::read(path)?;
        let parsed = Self::parse_uri(printer_uri)?;

        let job_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plotforge job".into());
        let color_mode = if options.color_mode.eq_ignore_ascii_case("color") {
            "color"
        } else {
            "monochrome"
        };

        let payload = IppPayload::new(Cursor::new(document));
        let operation = IppOperationBuilder::print_job(parsed.clone(), payload)
            .job_title(&job_name)
            .document_format(document_format(path))
            .attribute(IppAttribute::new(
                "copies",
                IppValue::Integer(options.copies.max(1) as i32),
            ))
            .attribute(IppAttribute::new(
                "print-color-mode",
                IppValue::Keyword(color_mode.into()),
            ))
            .build();

        let client = AsyncIppClient::new(parsed);
        info!(job = %job_name, format = document_format(path), "sending Print-Job");
        let response = self
            .runtime
            .block_on(client.send(operation))
            .map_err(|e| PlotforgeError::IppRequest(format!("Print-Job: {e}")))?;

        if !response.header().status_code().is_success() {
            let code = response.header().status_code();
            return Err(PlotforgeError::IppRequest(format!(
                "Print-Job returned status {code:?}"
            )));
        }

        let job_id = extract_job_id(response.attributes()).ok_or_else(|| {
            PlotforgeError::IppRequest("Print-Job response missing job-id attribute".into())
        })?;

        self.job_index
            .lock()
            .expect("job index lock poisoned")
            .insert(i64::from(job_id), printer_uri.to_string());

        info!(job_id, "print job accepted by printer");
        Ok(i64::from(job_id))
    }

    #[instrument(skip(self))]
    fn cancel(&self, spooler_id: i64) -> Result<()> {
        let uri = self
            .job_index
            .lock()
            .expect("job index lock poisoned")
            .get(&spooler_id)
            .cloned()
            .ok_or_else(|| {
                PlotforgeError::IppRequest(format!("unknown spooler id {spooler_id}"))
            })?;

        let parsed = Self::parse_uri(&uri)?;
        let operation = IppOperationBuilder::cancel_job(parsed.clone(), spooler_id as i32).build();
        let client = AsyncIppClient::new(parsed);

        info!(spooler_id, "sending Cancel-Job");
        let response = self
            .runtime
            .block_on(client.send(operation))
            .map_err(|e| PlotforgeError::IppRequest(format!("Cancel-Job({spooler_id}): {e}")))?;

        if !response.header().status_code().is_success() {
            let code = response.header().status_code();
            return Err(PlotforgeError::IppRequest(format!(
                "Cancel-Job({spooler_id}) returned status {code:?}"
            )));
        }

        info!(spooler_id, "job cancelled at printer");
        Ok(())
    }

    fn printer_attributes(&self, uri: &str) -> Result<DeviceRecord> {
        let attrs = self.query_attributes(uri)?;

        let mut record = DeviceRecord::unknown(uri);
        if let Some(name) = attrs.get("printer-name") {
            record.name = name.clone();
        }
        if let Some(make_model) = attrs.get("printer-make-and-model") {
            record.make_model = make_model.clone();
        }
        if let Some(location) = attrs.get("printer-location") {
            record.location = location.clone();
        }
        record.state = attrs
            .get("printer-state")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(5);
        record.state_reasons = attrs
            .get("printer-state-reasons")
            .map(|reasons| {
                reasons
                    .split(',')
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty() && r != "none")
                    .collect()
            })
            .unwrap_or_default();
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Helper functions for parsing IPP responses
// ---------------------------------------------------------------------------

/// Flatten all attribute groups in an IPP response into a single map.
///
/// This intentionally discards group-level context in favour of a simpler
/// lookup interface.
fn flatten_attributes(attrs: &IppAttributes) -> AttributeMap {
    let mut map = HashMap::new();
    for group in attrs.groups() {
        for (name, attr) in group.attributes() {
            map.insert(name.clone(), format!("{}", attr.value()));
        }
    }
    map
}

/// Extract the `job-id` integer from a response's Job Attributes group.
fn extract_job_id(attrs: &IppAttributes) -> Option<i32> {
    for group in attrs.groups_of(DelimiterTag::JobAttributes) {
        if let Some(attr) = group.attributes().get("job-id") {
            if let IppValue::Integer(id) = attr.value() {
                return Some(*id);
            }
        }
    }
    None
}

/// IPP `document-format` MIME type for a payload file.
fn document_format(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "ps" | "eps" => "application/postscript",
        "plt" | "hpgl" => "application/vnd.hp-hpgl",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        // Converted plotter payloads are already device-ready byte streams.
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_format_by_extension() {
        assert_eq!(document_format(Path::new("/tmp/a.pdf")), "application/pdf");
        assert_eq!(
            document_format(Path::new("/tmp/a.ps")),
            "application/postscript"
        );
        assert_eq!(
            document_format(Path::new("/tmp/a.plt")),
            "application/vnd.hp-hpgl"
        );
        assert_eq!(
            document_format(Path::new("/tmp/a.pdf.converted")),
            "application/octet-stream"
        );
    }

    #[test]
    fn invalid_uri_is_rejected() {
        let gateway = IppGateway::new(Vec::new()).expect("gateway");
        let result = gateway.printer_attributes("not a valid uri %%%");
        assert!(matches!(result, Err(PlotforgeError::IppRequest(_))));
    }

    #[test]
    fn unknown_spooler_id_cannot_be_cancelled() {
        let gateway = IppGateway::new(Vec::new()).expect("gateway");
        assert!(gateway.cancel(12345).is_err());
    }

    #[test]
    fn unreachable_endpoint_enumerates_as_stopped() {
        // Loopback port 1 refuses immediately; the endpoint must still
        // appear in the fleet, marked stopped.
        let gateway =
            IppGateway::new(vec!["ipp://127.0.0.1:1/ipp/print".into()]).expect("gateway");
        let devices = gateway.enumerate().expect("enumerate");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].state, 5);
        assert!(!devices[0].spooler_ready());
    }
}
