//! Tool output fixtures.
//!
//! Reports omit the `Exit Code:` line; [`ProcessOutput::combined`] appends it.

use backup_harness_ports::ProcessOutput;

/// Start time used by every report fixture.
pub const START_TIME: &str = "Tue, 3 Sep 2024 08:00:00 GMT";

/// Successful run printing `stdout`.
pub fn ok(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        stdout: stdout.to_string(),
        ..ProcessOutput::default()
    }
}

/// Run exiting with `code` and printing `stderr`.
pub fn exit(code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        stderr: stderr.to_string(),
        exit_code: code,
        ..ProcessOutput::default()
    }
}

/// `asbackup` summary for `records` records.
pub fn backup_report(records: u64) -> String {
    format!(
        "Backup Report\n\
         Start Time: {START_TIME}\n\
         Duration: 1.5s\n\
         Records Read: {records}\n\
         sIndex Read: 0\n\
         UDFs Read: 0\n\
         Bytes Written: {} bytes\n\
         Files Written: 1\n",
        records.saturating_mul(128)
    )
}

/// `asbackup xdr` summary, which reports received instead of read records.
pub fn xdr_backup_report(records: u64) -> String {
    backup_report(records).replace("Records Read:", "Records Received:")
}

/// `asrestore` summary; records read is `inserted + existed`.
pub fn restore_report(inserted: u64, existed: u64) -> String {
    let read = inserted.saturating_add(existed);
    format!(
        "Restore Report\n\
         Start Time: {START_TIME}\n\
         Duration: 800ms\n\
         Records Read: {read}\n\
         sIndex Read: 0\n\
         UDFs Read: 0\n\
         Expired Records: 0\n\
         Skipped Records: 0\n\
         Ignored Records: 0\n\
         Fresher Records: 0\n\
         Existed Records: {existed}\n\
         Inserted Records: {inserted}\n\
         Total Bytes Read: {}\n",
        read.saturating_mul(128)
    )
}

/// `asbackup --estimate` output.
pub fn estimate_report(bytes: u64) -> String {
    format!("level=INFO msg=\"estimating\"\nFile size (bytes): {bytes}\n")
}

/// `asrestore --validate` output for one backup file.
pub fn validation_report(records: u64) -> String {
    format!(
        "level=INFO msg=\"found asb files\" number=1\n\
         Validation report\n\
         Records Read: {records}\n\
         sIndex Read: 0\n\
         UDFs Read: 0\n\
         Total Bytes Read: {}\n",
        records.saturating_mul(128)
    )
}
