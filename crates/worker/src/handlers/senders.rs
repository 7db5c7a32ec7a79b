//! 日志后端的发送实现
//!
//! 邮件/短信/聊天的真实通道是部署期集成点，缺省实现只落日志，
//! 与任务管线解耦。

use async_trait::async_trait;
use tracing::info;

use shopd_core::traits::{ChatNotifier, EmailSender, SmsSender};
use shopd_core::ShopResult;

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ShopResult<()> {
        info!(to, subject, body_len = body.len(), "发送邮件");
        Ok(())
    }
}

pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, phone: &str, message: &str) -> ShopResult<()> {
        info!(phone, message, "发送短信");
        Ok(())
    }
}

pub struct LogChatNotifier;

#[async_trait]
impl ChatNotifier for LogChatNotifier {
    async fn send(&self, chat_id: &str, message: &str) -> ShopResult<()> {
        info!(chat_id, message, "发送聊天消息");
        Ok(())
    }
}
