//! Common regex patterns for pickup order extraction.
//!
//! Labels are matched in English and Italian. Most field labels are anchored
//! to the start of a line, which is how OCR output and text layers lay them out.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Order number
    pub static ref ORDER_NUMBER: Regex = Regex::new(
        r"(?im)(?:order\s*(?:no\.?|number|n[°º.]|#)|ordine\s*(?:numero|n[°º.]?)|numero\s+ordine|n[°º.]\s*ordine)[\s:#]*([A-Za-z0-9][A-Za-z0-9/\-_.]*)"
    ).unwrap();

    // Date formats
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_ITALIAN_LONG: Regex = Regex::new(
        r"(?i)\b(\d{1,2})\s+(gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre)\s+(\d{4})\b"
    ).unwrap();

    // Labeled dates
    pub static ref ISSUE_DATE: Regex = Regex::new(
        r"(?im)^\s*(?:issue\s+date|date\s+of\s+issue|issued\s+on|data\s+(?:di\s+)?emissione|data\s+ordine)[\s:]*(.+?)\s*$"
    ).unwrap();

    pub static ref SCHEDULED_DATE: Regex = Regex::new(
        r"(?im)^\s*(?:scheduled\s+(?:date|pickup)|pickup\s+date|data\s+(?:di\s+)?ritiro|data\s+programmata)[\s:]*(.+?)\s*$"
    ).unwrap();

    pub static ref AVAILABILITY_DATE: Regex = Regex::new(
        r"(?im)^\s*(?:availability\s+date|available\s+from|data\s+(?:di\s+)?disponibilit[aà])[\s:]*(.+?)\s*$"
    ).unwrap();

    pub static ref SHIPPING_REQUEST_DATE: Regex = Regex::new(
        r"(?im)^\s*(?:shipping\s+request\s+date|data\s+(?:di\s+)?richiesta\s+(?:spedizione|trasporto))[\s:]*(.+?)\s*$"
    ).unwrap();

    // Party sections
    pub static ref SENDER_SECTION: Regex = Regex::new(
        r"(?im)^\s*(?:sender|shipper|mittente|produttore)\b\s*:?"
    ).unwrap();

    pub static ref RECIPIENT_SECTION: Regex = Regex::new(
        r"(?im)^\s*(?:recipient|consignee|destinatario)\b\s*:?"
    ).unwrap();

    // Party fields (inside a section)
    pub static ref PARTY_NAME: Regex = Regex::new(
        r"(?im)^\s*(?:name|company|nome|ragione\s+sociale)\s*:\s*(.+?)\s*$"
    ).unwrap();

    pub static ref PARTY_ADDRESS: Regex = Regex::new(
        r"(?im)^\s*(?:address|street|indirizzo|via)\s*:\s*(.+?)\s*$"
    ).unwrap();

    pub static ref PARTY_CITY: Regex = Regex::new(
        r"(?im)^\s*(?:city|town|citt[aà]|comune)\s*:\s*(.+?)\s*$"
    ).unwrap();

    // Basin
    pub static ref BASIN_CODE: Regex = Regex::new(
        r"(?im)^\s*(?:basin\s+code|basin|codice\s+bacino|bacino)\s*[:#]\s*(\S+)"
    ).unwrap();

    pub static ref BASIN_DESCRIPTION: Regex = Regex::new(
        r"(?im)^\s*(?:basin\s+description|descrizione\s+bacino)\s*:\s*(.+?)\s*$"
    ).unwrap();

    // Flow type
    pub static ref FLOW_TYPE: Regex = Regex::new(
        r"(?im)^\s*(?:flow\s+type|flow|tipo\s+(?:di\s+)?flusso|flusso)\s*:\s*(.+?)\s*$"
    ).unwrap();

    // Quantities (decimal comma or point, optional thousands grouping)
    pub static ref DISTANCE_KM: Regex = Regex::new(
        r"(?im)^\s*(?:distance|distanza)(?:\s*\(km\))?\s*:\s*(\d{1,3}(?:[. ]\d{3})+(?:,\d+)?|\d+(?:[.,]\d+)?)"
    ).unwrap();

    pub static ref EXPECTED_QUANTITY: Regex = Regex::new(
        r"(?im)^\s*(?:expected\s+quantity|quantity|quantit[aà](?:\s+(?:prevista|attesa))?)(?:\s*\([^)]*\))?\s*:\s*(\d{1,3}(?:[. ]\d{3})+(?:,\d+)?|\d+(?:[.,]\d+)?)"
    ).unwrap();

    // Email pattern
    pub static ref EMAIL: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
    ).unwrap();
}
