//! The typed operation surface: one async method per protocol message.
//!
//! Each method registers a completion handler, formats and writes the
//! request line, and returns a [`Call`] handle; awaiting the handle yields
//! the typed result once the dispatcher has decoded the response. Methods
//! return as soon as the request is on the wire, so any number of calls can
//! be in flight concurrently.
//!
//! Where the protocol wants a conference or person number, methods accept
//! the name instead when the original operation did, resolving it through
//! the shared server's caches; a name that is in neither cache resolves to
//! the invalid number 0 and the server's error report does the rest.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::OffsetComponents;

use lyskom_protocol::types::{
    AnyConfType, ConfNo, ConfZInfo, InfoOld, InfoType, Mark, Person, PrivBits, SessionNo, TextNo,
    UConference, VersionInfo,
};
use lyskom_protocol::{CallNo, RequestArgs};

use crate::call::{channel, Call, ResponseHandler};
use crate::connection::Connection;
use crate::error::ClientError;
use crate::registry::{self, KomServer};

/// A logical client on a shared server connection.
#[derive(Clone)]
pub struct KomClient {
    server: Arc<KomServer>,
}

impl KomClient {
    /// Creates a client for `address`, sharing the engine with every other
    /// client of the same address through the process-wide registry.
    pub async fn new(address: &str) -> Result<Self, ClientError> {
        Ok(Self {
            server: registry::get_server(address).await?,
        })
    }

    /// Creates a client on an explicit server entry, e.g. one built from a
    /// custom dialer via [`KomServer::detached`].
    pub fn with_server(server: Arc<KomServer>) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &Arc<KomServer> {
        &self.server
    }

    fn conn(&self) -> &Connection {
        self.server.connection()
    }

    /// Resolves a person name through the person cache. Unknown names
    /// resolve to 0, which no person has.
    pub fn person_no(&self, name: &str) -> ConfNo {
        self.server.lookup_person(name).unwrap_or(0)
    }

    /// Resolves a conference name: the person cache first (a letterbox is a
    /// conference), then the conference cache. Unknown names resolve to 0.
    pub fn conference_no(&self, name: &str) -> ConfNo {
        self.server
            .lookup_person(name)
            .or_else(|| self.server.lookup_conference(name))
            .unwrap_or(0)
    }

    async fn generic(&self, call: CallNo, args: RequestArgs) -> Result<Call<()>, ClientError> {
        let (tx, handle) = channel();
        self.conn()
            .submit(call, args.as_str(), ResponseHandler::Generic(tx))
            .await?;
        Ok(handle)
    }

    // Session calls

    /// Logs out without terminating the session (call 1).
    pub async fn logout(&self) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::Logout, RequestArgs::new()).await
    }

    /// Changes the working conference (call 2).
    pub async fn change_conference(&self, conference: &str) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(CallNo::ChangeConference, RequestArgs::new().uint(conf))
            .await
    }

    /// Renames a conference or person (call 3).
    pub async fn change_name(
        &self,
        conference: &str,
        new_name: &str,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(
            CallNo::ChangeName,
            RequestArgs::new().uint(conf).string(new_name),
        )
        .await
    }

    /// Updates the "what am I doing" string shown to other sessions (call 4).
    pub async fn change_what_i_am_doing(&self, doing: &str) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::ChangeWhatIAmDoing, RequestArgs::new().string(doing))
            .await
    }

    /// Sets a person's privilege bits (call 7).
    pub async fn set_priv_bits(
        &self,
        person: ConfNo,
        privileges: PrivBits,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SetPrivBits,
            RequestArgs::new()
                .uint(person)
                .bit_field(&privileges.bit_field()),
        )
        .await
    }

    /// Changes a person's password (call 8). Requires the old password, or
    /// the privileges to override it.
    pub async fn set_passwd(
        &self,
        person: ConfNo,
        old_password: &str,
        new_password: &str,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SetPasswd,
            RequestArgs::new()
                .uint(person)
                .string(old_password)
                .string(new_password),
        )
        .await
    }

    // Conference administration

    /// Deletes a conference (call 11).
    pub async fn delete_conf(&self, conference: &str) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(CallNo::DeleteConf, RequestArgs::new().uint(conf))
            .await
    }

    /// Removes a member from a conference (call 15).
    pub async fn sub_member(
        &self,
        person: &str,
        conference: &str,
    ) -> Result<Call<()>, ClientError> {
        let pers = self.person_no(person);
        let conf = self.conference_no(conference);
        self.generic(CallNo::SubMember, RequestArgs::new().uint(conf).uint(pers))
            .await
    }

    /// Sets a conference's presentation text (call 16).
    pub async fn set_presentation(
        &self,
        conference: &str,
        text: TextNo,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(
            CallNo::SetPresentation,
            RequestArgs::new().uint(conf).uint(text),
        )
        .await
    }

    /// Sets a conference's notice text (call 17).
    pub async fn set_etc_motd(
        &self,
        conference: &str,
        text: TextNo,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(CallNo::SetEtcMotd, RequestArgs::new().uint(conf).uint(text))
            .await
    }

    /// Sets a conference's supervisor (call 18). The two names resolve
    /// independently.
    pub async fn set_supervisor(
        &self,
        conference: &str,
        admin: &str,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        let admin = self.conference_no(admin);
        self.generic(
            CallNo::SetSupervisor,
            RequestArgs::new().uint(conf).uint(admin),
        )
        .await
    }

    /// Restricts who may submit texts to a conference (call 19).
    pub async fn set_permitted_submitters(
        &self,
        conference: &str,
        permitted: &str,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        let perm = self.conference_no(permitted);
        self.generic(
            CallNo::SetPermittedSubmitters,
            RequestArgs::new().uint(conf).uint(perm),
        )
        .await
    }

    /// Sets a conference's super-conference (call 20).
    pub async fn set_super_conf(
        &self,
        conference: &str,
        super_conf: &str,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        let sup = self.conference_no(super_conf);
        self.generic(
            CallNo::SetSuperConf,
            RequestArgs::new().uint(conf).uint(sup),
        )
        .await
    }

    /// Changes a conference's type bits (call 21). Accepts either the
    /// four-bit or the eight-bit encoding.
    pub async fn set_conf_type(
        &self,
        conference: &str,
        conf_type: AnyConfType,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(
            CallNo::SetConfType,
            RequestArgs::new()
                .uint(conf)
                .bit_field(&conf_type.bit_field()),
        )
        .await
    }

    /// Sets the garbage-collection lifetime of texts in a conference, in
    /// days (call 22).
    pub async fn set_garb_nice(
        &self,
        conference: &str,
        nice: u32,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(
            CallNo::SetGarbNice,
            RequestArgs::new().uint(conf).uint(nice),
        )
        .await
    }

    // Texts and marks

    /// Fetches the logged-in person's marked texts (call 23).
    pub async fn get_marks(&self) -> Result<Call<Vec<Mark>>, ClientError> {
        let (tx, handle) = channel();
        self.conn()
            .submit(CallNo::GetMarks, "", ResponseHandler::Marks(tx))
            .await?;
        Ok(handle)
    }

    /// Retrieves (part of) a text (call 25). `start` and `end` bound the
    /// character range; the contents come back as raw bytes.
    pub async fn get_text(
        &self,
        text: TextNo,
        start: u32,
        end: u32,
    ) -> Result<Call<Vec<u8>>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(text).uint(start).uint(end);
        self.conn()
            .submit(CallNo::GetText, args.as_str(), ResponseHandler::TextBytes(tx))
            .await?;
        Ok(handle)
    }

    /// Marks texts as read in a conference (call 27).
    pub async fn mark_as_read(
        &self,
        conference: &str,
        texts: &[TextNo],
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(
            CallNo::MarkAsRead,
            RequestArgs::new().uint(conf).array(texts),
        )
        .await
    }

    /// Deletes a text (call 29).
    pub async fn delete_text(&self, text: TextNo) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::DeleteText, RequestArgs::new().uint(text))
            .await
    }

    /// Adds a recipient to a text (call 30).
    pub async fn add_recipient(
        &self,
        text: TextNo,
        conference: &str,
        kind: InfoType,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(
            CallNo::AddRecipient,
            RequestArgs::new()
                .uint(text)
                .uint(conf)
                .uint(kind.wire_value()),
        )
        .await
    }

    /// Removes a recipient from a text (call 31).
    pub async fn sub_recipient(
        &self,
        text: TextNo,
        conference: &str,
    ) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(
            CallNo::SubRecipient,
            RequestArgs::new().uint(text).uint(conf),
        )
        .await
    }

    /// Makes `text` a comment to `comment_to` (call 32).
    pub async fn add_comment(
        &self,
        text: TextNo,
        comment_to: TextNo,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::AddComment,
            RequestArgs::new().uint(text).uint(comment_to),
        )
        .await
    }

    /// Removes a comment link (call 33).
    pub async fn sub_comment(
        &self,
        text: TextNo,
        comment_to: TextNo,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SubComment,
            RequestArgs::new().uint(text).uint(comment_to),
        )
        .await
    }

    /// Asks for the server's wall-clock time (call 35), presented in UTC.
    pub async fn get_time(&self) -> Result<Call<DateTime<Utc>>, ClientError> {
        let (tx, handle) = channel();
        self.conn()
            .submit(CallNo::GetTime, "", ResponseHandler::Time(tx))
            .await?;
        Ok(handle)
    }

    /// Makes `text` a footnote to `footnote_to` (call 37).
    pub async fn add_footnote(
        &self,
        text: TextNo,
        footnote_to: TextNo,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::AddFootnote,
            RequestArgs::new().uint(text).uint(footnote_to),
        )
        .await
    }

    /// Removes a footnote link (call 38).
    pub async fn sub_footnote(
        &self,
        text: TextNo,
        footnote_to: TextNo,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SubFootnote,
            RequestArgs::new().uint(text).uint(footnote_to),
        )
        .await
    }

    /// Sets the number of unread texts in a conference (call 40).
    pub async fn set_unread(&self, conference: &str, unread: u32) -> Result<Call<()>, ClientError> {
        let conf = self.conference_no(conference);
        self.generic(CallNo::SetUnread, RequestArgs::new().uint(conf).uint(unread))
            .await
    }

    /// Sets the server's login message (call 41).
    pub async fn set_motd_of_lyskom(&self, text: TextNo) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::SetMotdOfLyskom, RequestArgs::new().uint(text))
            .await
    }

    // Server administration

    /// Enables privileges up to `level` for the current session (call 42).
    pub async fn enable(&self, level: u8) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::Enable, RequestArgs::new().uint(level))
            .await
    }

    /// Asks the server to sync its database to disk (call 43).
    pub async fn sync_kom(&self) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::SyncKom, RequestArgs::new()).await
    }

    /// Asks the server to shut down (call 44).
    pub async fn shutdown_kom(&self, exit_value: u8) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::ShutdownKom, RequestArgs::new().uint(exit_value))
            .await
    }

    // Status queries

    /// Fetches a person's statistics (call 49).
    pub async fn get_person_stat(&self, person: ConfNo) -> Result<Call<Person>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(person);
        self.conn()
            .submit(
                CallNo::GetPersonStat,
                args.as_str(),
                ResponseHandler::Person(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Lists the conferences in which a person has unread texts (call 52).
    pub async fn get_unread_confs(
        &self,
        person: ConfNo,
    ) -> Result<Call<Vec<ConfNo>>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(person);
        self.conn()
            .submit(
                CallNo::GetUnreadConfs,
                args.as_str(),
                ResponseHandler::ConfNos(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Sends an instant message to a person or conference (call 53).
    pub async fn send_message(
        &self,
        recipient: ConfNo,
        message: &str,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SendMessage,
            RequestArgs::new().uint(recipient).string(message),
        )
        .await
    }

    /// Forcibly disconnects a session (call 55).
    pub async fn disconnect(&self, session: SessionNo) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::Disconnect, RequestArgs::new().uint(session))
            .await
    }

    /// Asks which session number this connection has (call 56).
    pub async fn who_am_i(&self) -> Result<Call<SessionNo>, ClientError> {
        let (tx, handle) = channel();
        self.conn()
            .submit(CallNo::WhoAmI, "", ResponseHandler::SessionNo(tx))
            .await?;
        Ok(handle)
    }

    /// Sets a person's user area text (call 57).
    pub async fn set_user_area(
        &self,
        person: ConfNo,
        text: TextNo,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SetUserArea,
            RequestArgs::new().uint(person).uint(text),
        )
        .await
    }

    /// Finds the last text created before `when` (call 58). The weekday,
    /// ordinal day and DST flag of the tuple are computed from the instant
    /// in its stated time zone.
    pub async fn get_last_text<Tz>(&self, when: &DateTime<Tz>) -> Result<Call<TextNo>, ClientError>
    where
        Tz: TimeZone,
        Tz::Offset: OffsetComponents,
    {
        let (tx, handle) = channel();
        let args = RequestArgs::new().time(when);
        self.conn()
            .submit(
                CallNo::GetLastText,
                args.as_str(),
                ResponseHandler::TextNo(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Finds the next existing text after `text` (call 60).
    pub async fn find_next_text_no(&self, text: TextNo) -> Result<Call<TextNo>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(text);
        self.conn()
            .submit(
                CallNo::FindNextTextNo,
                args.as_str(),
                ResponseHandler::TextNo(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Finds the closest existing text before `text` (call 61).
    pub async fn find_previous_text_no(&self, text: TextNo) -> Result<Call<TextNo>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(text);
        self.conn()
            .submit(
                CallNo::FindPreviousTextNo,
                args.as_str(),
                ResponseHandler::TextNo(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Logs in (call 62). An invisible session is not shown in who-is-on
    /// listings.
    pub async fn login(
        &self,
        person: &str,
        password: &str,
        invisible: bool,
    ) -> Result<Call<()>, ClientError> {
        let pers = self.person_no(person);
        self.generic(
            CallNo::Login,
            RequestArgs::new()
                .uint(pers)
                .string(password)
                .boolean(invisible),
        )
        .await
    }

    /// Reports the client's name and version to the server (call 69).
    pub async fn set_client_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SetClientVersion,
            RequestArgs::new().string(name).string(version),
        )
        .await
    }

    /// Fetches the client name another session reported (call 70).
    pub async fn get_client_name(&self, session: SessionNo) -> Result<Call<String>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(session);
        self.conn()
            .submit(
                CallNo::GetClientName,
                args.as_str(),
                ResponseHandler::Text(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Fetches the client version another session reported (call 71).
    pub async fn get_client_version(
        &self,
        session: SessionNo,
    ) -> Result<Call<String>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(session);
        self.conn()
            .submit(
                CallNo::GetClientVersion,
                args.as_str(),
                ResponseHandler::Text(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Marks a text with the given mark value (call 72).
    pub async fn mark_text(&self, text: TextNo, mark: u8) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::MarkText, RequestArgs::new().uint(text).uint(mark))
            .await
    }

    /// Removes the mark from a text (call 73).
    pub async fn unmark_text(&self, text: TextNo) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::UnmarkText, RequestArgs::new().uint(text))
            .await
    }

    // Lookups

    /// Looks up conferences and/or persons matching a regular expression
    /// (call 74).
    pub async fn re_z_lookup(
        &self,
        regexp: &str,
        want_persons: bool,
        want_confs: bool,
    ) -> Result<Call<Vec<ConfZInfo>>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new()
            .string(regexp)
            .boolean(want_persons)
            .boolean(want_confs);
        self.conn()
            .submit(CallNo::ReZLookup, args.as_str(), ResponseHandler::ZConfs(tx))
            .await?;
        Ok(handle)
    }

    /// Asks which protocol and software versions the server runs (call 75).
    pub async fn get_version_info(&self) -> Result<Call<VersionInfo>, ClientError> {
        let (tx, handle) = channel();
        self.conn()
            .submit(CallNo::GetVersionInfo, "", ResponseHandler::Version(tx))
            .await?;
        Ok(handle)
    }

    /// Looks up conferences and/or persons by name, using the protocol's
    /// abbreviation rules (call 76). On the wire the want-persons flag
    /// precedes want-confs.
    pub async fn lookup_z_name(
        &self,
        name: &str,
        want_confs: bool,
        want_persons: bool,
    ) -> Result<Call<Vec<ConfZInfo>>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new()
            .string(name)
            .boolean(want_persons)
            .boolean(want_confs);
        self.conn()
            .submit(
                CallNo::LookupZName,
                args.as_str(),
                ResponseHandler::ZConfs(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Moves the read pointer of a conference (call 77).
    pub async fn set_last_read(
        &self,
        conference: ConfNo,
        text: TextNo,
    ) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SetLastRead,
            RequestArgs::new().uint(conference).uint(text),
        )
        .await
    }

    /// Fetches the abbreviated status of a conference (call 78).
    pub async fn get_uconf_stat(
        &self,
        conference: ConfNo,
    ) -> Result<Call<UConference>, ClientError> {
        let (tx, handle) = channel();
        let args = RequestArgs::new().uint(conference);
        self.conn()
            .submit(
                CallNo::GetUconfStat,
                args.as_str(),
                ResponseHandler::UConference(tx),
            )
            .await?;
        Ok(handle)
    }

    /// Replaces the server information block (call 79).
    pub async fn set_info(&self, info: InfoOld) -> Result<Call<()>, ClientError> {
        self.generic(
            CallNo::SetInfo,
            RequestArgs::new()
                .uint(info.version)
                .uint(info.conf_pres_conf)
                .uint(info.pers_pres_conf)
                .uint(info.motd_conf)
                .uint(info.kom_news_conf)
                .uint(info.motd_of_lyskom),
        )
        .await
    }

    /// Chooses which asynchronous messages the server should send
    /// (call 80).
    pub async fn accept_async(&self, messages: &[u32]) -> Result<Call<()>, ClientError> {
        self.generic(CallNo::AcceptAsync, RequestArgs::new().array(messages))
            .await
    }

    /// Asks which asynchronous messages the server is sending (call 81).
    pub async fn query_async(&self) -> Result<Call<Vec<u32>>, ClientError> {
        let (tx, handle) = channel();
        self.conn()
            .submit(CallNo::QueryAsync, "", ResponseHandler::CallNos(tx))
            .await?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    async fn harness() -> (KomClient, BufReader<tokio::io::DuplexStream>) {
        let (local, remote) = tokio::io::duplex(4096);
        let conn = Arc::new(Connection::from_stream(local, "test"));
        let server = KomServer::detached(conn);
        (KomClient::with_server(server), BufReader::new(remote))
    }

    async fn next_line(remote: &mut BufReader<tokio::io::DuplexStream>) -> String {
        let mut line = String::new();
        remote.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn login_line_resolves_the_person_cache() {
        let (client, mut remote) = harness().await;
        client.server().learn_person("José", 7);

        let _call = client.login("José", "hemligt", false).await.unwrap();
        assert_eq!(next_line(&mut remote).await, "1 62 7 7Hhemligt 0\n");

        let _call = client.login("nobody", "x", true).await.unwrap();
        assert_eq!(next_line(&mut remote).await, "2 62 0 1Hx 1\n");
    }

    #[tokio::test]
    async fn conference_resolution_is_person_first() {
        let (client, mut remote) = harness().await;
        client.server().learn_person("Double", 5);
        client.server().learn_conference("Double", 9);
        client.server().learn_conference("Trains", 11);

        let _call = client.change_conference("Double").await.unwrap();
        assert_eq!(next_line(&mut remote).await, "1 2 5\n");

        let _call = client.change_conference("Trains").await.unwrap();
        assert_eq!(next_line(&mut remote).await, "2 2 11\n");

        assert_eq!(client.conference_no("missing"), 0);
        assert_eq!(client.person_no("Trains"), 0);
    }

    #[tokio::test]
    async fn set_supervisor_resolves_both_names() {
        let (client, mut remote) = harness().await;
        client.server().learn_conference("Test Conference", 10);
        client.server().learn_person("David Byers", 6);

        let _call = client
            .set_supervisor("Test Conference", "David Byers")
            .await
            .unwrap();
        assert_eq!(next_line(&mut remote).await, "1 18 10 6\n");
    }

    #[tokio::test]
    async fn priv_bits_and_arrays_encode_on_the_wire() {
        let (client, mut remote) = harness().await;
        client.server().learn_conference("Inbox", 4);

        let bits = PrivBits {
            wheel: true,
            admin: true,
            change_name: true,
            ..Default::default()
        };
        let _call = client.set_priv_bits(7, bits).await.unwrap();
        assert_eq!(next_line(&mut remote).await, "1 7 7 1100010000000000\n");

        let _call = client.mark_as_read("Inbox", &[13020, 13043]).await.unwrap();
        assert_eq!(next_line(&mut remote).await, "2 27 4 2 { 13020 13043 }\n");

        let _call = client.accept_async(&[]).await.unwrap();
        assert_eq!(next_line(&mut remote).await, "3 80 0 { }\n");
    }

    #[tokio::test]
    async fn get_last_text_encodes_the_tuple_in_the_given_zone() {
        let (client, mut remote) = harness().await;
        let when = chrono_tz::Europe::Stockholm
            .with_ymd_and_hms(1997, 7, 19, 22, 6, 49)
            .unwrap();
        let _call = client.get_last_text(&when).await.unwrap();
        assert_eq!(
            next_line(&mut remote).await,
            "1 58 49 6 22 19 6 97 6 199 1\n"
        );
    }

    #[tokio::test]
    async fn lookup_z_name_writes_persons_flag_first() {
        let (client, mut remote) = harness().await;
        let _call = client.lookup_z_name("test", true, false).await.unwrap();
        // want_confs = true, want_persons = false: persons flag first.
        assert_eq!(next_line(&mut remote).await, "1 76 4Htest 0 1\n");
    }

    #[tokio::test]
    async fn set_conf_type_accepts_both_widths() {
        let (client, mut remote) = harness().await;
        client.server().learn_conference("C", 3);

        use lyskom_protocol::types::{ConfType, ExtendedConfType};
        let _call = client
            .set_conf_type("C", AnyConfType::Basic(ConfType::default()))
            .await
            .unwrap();
        assert_eq!(next_line(&mut remote).await, "1 21 3 0000\n");

        let _call = client
            .set_conf_type(
                "C",
                AnyConfType::Extended(ExtendedConfType {
                    allow_anonymous: true,
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        assert_eq!(next_line(&mut remote).await, "2 21 3 00001000\n");
    }

    #[tokio::test]
    async fn no_argument_calls_have_bare_lines() {
        let (client, mut remote) = harness().await;
        let _call = client.get_marks().await.unwrap();
        assert_eq!(next_line(&mut remote).await, "1 23\n");
        let _call = client.who_am_i().await.unwrap();
        assert_eq!(next_line(&mut remote).await, "2 56\n");
        let _call = client.query_async().await.unwrap();
        assert_eq!(next_line(&mut remote).await, "3 81\n");
    }

    #[tokio::test]
    async fn set_info_flattens_the_block() {
        let (client, mut remote) = harness().await;
        let info = InfoOld {
            version: 10901,
            conf_pres_conf: 1,
            pers_pres_conf: 2,
            motd_conf: 3,
            kom_news_conf: 4,
            motd_of_lyskom: 1080,
        };
        let _call = client.set_info(info).await.unwrap();
        assert_eq!(next_line(&mut remote).await, "1 79 10901 1 2 3 4 1080\n");
    }
}
